//! Domain error model.

use thiserror::Error;

use crate::id::{ProductId, WarehouseId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant carries enough context (entity id, states, product and
/// shortfall) for a caller to build an actionable message without re-querying.
/// Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (malformed input, unknown enum value).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A stock movement would drive the quantity below zero.
    #[error(
        "insufficient stock for product {product_id} in warehouse {warehouse_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        available: i64,
        requested: i64,
    },

    /// A state machine refused the requested transition.
    #[error("{entity} {id} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    /// A uniqueness rule was violated (e.g. duplicate SKU).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A domain invariant was found broken (e.g. a corrupted movement chain).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient_stock(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        available: i64,
        requested: i64,
    ) -> Self {
        Self::InsufficientStock {
            product_id,
            warehouse_id,
            available,
            requested,
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: impl core::fmt::Display,
        from: impl core::fmt::Display,
        to: impl core::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Units missing to satisfy an `InsufficientStock` request.
    pub fn shortfall(&self) -> Option<i64> {
        match self {
            Self::InsufficientStock {
                available,
                requested,
                ..
            } => Some(requested.saturating_sub(*available)),
            _ => None,
        }
    }
}
