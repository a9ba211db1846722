//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Monetary amount in minor currency units (cents).
///
/// Arithmetic is checked; an overflow is surfaced as a validation error rather
/// than wrapping.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Reject negative amounts, naming the offending field.
    pub fn ensure_non_negative(self, field: &str) -> DomainResult<Self> {
        if self.is_negative() {
            return Err(DomainError::validation(format!(
                "{field} cannot be negative (got {})",
                self.0
            )));
        }
        Ok(self)
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("monetary amount overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("monetary amount overflow"))
    }

    pub fn checked_mul(self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .ok_or_else(|| DomainError::validation("monetary amount overflow"))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
