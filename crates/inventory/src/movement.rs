use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    DomainError, DomainResult, MovementId, ProductId, StockRecordId, UserId, WarehouseId,
    wire_enum,
};

wire_enum! {
    /// Kind of stock movement. The kind fixes the sign of the delta, except for
    /// `Ajuste` whose delta is signed explicitly.
    pub enum MovementKind: "movement kind" {
        /// Goods received (purchase completion, initial stock).
        Entrada => "ENTRADA",
        /// Goods issued (sale).
        Salida => "SALIDA",
        /// Manual correction or physical count.
        Ajuste => "AJUSTE",
        /// Goods returned to the shelf.
        Devolucion => "DEVOLUCION",
    }
}

/// A request to move stock on one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub kind: MovementKind,
    /// Units moved. Positive for every kind but `Ajuste`, where it is the signed delta.
    pub quantity: i64,
    pub reason: String,
    pub actor: Option<UserId>,
}

impl MovementRequest {
    pub fn new(kind: MovementKind, quantity: i64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            quantity,
            reason: reason.into(),
            actor: None,
        }
    }

    pub fn by(mut self, actor: Option<UserId>) -> Self {
        self.actor = actor;
        self
    }

    /// Signed quantity change implied by the kind.
    pub fn delta(&self) -> DomainResult<i64> {
        match self.kind {
            MovementKind::Entrada | MovementKind::Devolucion | MovementKind::Salida => {
                if self.quantity <= 0 {
                    return Err(DomainError::validation(format!(
                        "{} quantity must be positive (got {})",
                        self.kind, self.quantity
                    )));
                }
                Ok(if self.kind == MovementKind::Salida {
                    -self.quantity
                } else {
                    self.quantity
                })
            }
            MovementKind::Ajuste => {
                if self.quantity == 0 {
                    return Err(DomainError::validation("adjustment delta cannot be zero"));
                }
                Ok(self.quantity)
            }
        }
    }
}

/// One immutable line of the movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub id: MovementId,
    pub stock_record_id: StockRecordId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    pub delta: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reason: String,
    pub actor: Option<UserId>,
    /// Position of this entry within its record's log, starting at 1.
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
}

impl MovementEntry {
    /// `stock_after = stock_before + delta`, with the delta's sign matching the kind.
    pub fn is_well_formed(&self) -> bool {
        let sign_ok = match self.kind {
            MovementKind::Entrada | MovementKind::Devolucion => self.delta > 0,
            MovementKind::Salida => self.delta < 0,
            MovementKind::Ajuste => self.delta != 0,
        };
        sign_ok && self.stock_before.checked_add(self.delta) == Some(self.stock_after)
    }
}
