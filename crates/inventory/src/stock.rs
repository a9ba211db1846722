use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    DomainError, DomainResult, Entity, MovementId, ProductId, StockRecordId, WarehouseId,
};

use crate::movement::{MovementEntry, MovementRequest};

/// The (product, warehouse) pair a stock record is unique on.
///
/// Ordering is product first, then warehouse; multi-record operations lock in
/// this order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

impl StockKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.warehouse_id)
    }
}

/// Reorder thresholds and shelf location of a stock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockThresholds {
    pub min: i64,
    pub max: Option<i64>,
    pub location: Option<String>,
}

impl StockThresholds {
    pub fn new(min: i64, max: Option<i64>, location: Option<String>) -> DomainResult<Self> {
        let thresholds = Self { min, max, location };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.min < 0 {
            return Err(DomainError::validation(format!(
                "minimum stock cannot be negative (got {})",
                self.min
            )));
        }
        if let Some(max) = self.max {
            if max < self.min {
                return Err(DomainError::validation(format!(
                    "maximum stock {max} is below minimum {}",
                    self.min
                )));
            }
        }
        Ok(())
    }
}

/// Everything needed to rebuild a record loaded from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecordParts {
    pub id: StockRecordId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub thresholds: StockThresholds,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current-quantity snapshot for one (product, warehouse) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockRecord {
    id: StockRecordId,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    quantity: i64,
    thresholds: StockThresholds,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// A fresh record at quantity 0.
    pub fn open(
        key: StockKey,
        thresholds: StockThresholds,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        thresholds.validate()?;
        Ok(Self {
            id: StockRecordId::new(),
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
            quantity: 0,
            thresholds,
            version: 0,
            created_at: at,
            updated_at: at,
        })
    }

    /// Rebuild from storage. A negative quantity means the store is corrupt.
    pub fn restore(parts: StockRecordParts) -> DomainResult<Self> {
        if parts.quantity < 0 {
            return Err(DomainError::invariant(format!(
                "stock record {} holds negative quantity {}",
                parts.id, parts.quantity
            )));
        }
        Ok(Self {
            id: parts.id,
            product_id: parts.product_id,
            warehouse_id: parts.warehouse_id,
            quantity: parts.quantity,
            thresholds: parts.thresholds,
            version: parts.version,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    pub fn id(&self) -> StockRecordId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.warehouse_id)
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn thresholds(&self) -> &StockThresholds {
        &self.thresholds
    }

    /// Number of movements applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.thresholds.min
    }

    /// Apply one movement, returning the log entry that describes it.
    ///
    /// On error the record is left untouched.
    pub fn apply(
        &mut self,
        request: &MovementRequest,
        at: DateTime<Utc>,
    ) -> DomainResult<MovementEntry> {
        let delta = request.delta()?;
        let before = self.quantity;
        let after = before
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;

        if after < 0 {
            let requested = delta
                .checked_neg()
                .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;
            return Err(DomainError::insufficient_stock(
                self.product_id,
                self.warehouse_id,
                before,
                requested,
            ));
        }

        self.quantity = after;
        self.version += 1;
        self.updated_at = at;

        Ok(MovementEntry {
            id: MovementId::new(),
            stock_record_id: self.id,
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            kind: request.kind,
            delta,
            stock_before: before,
            stock_after: after,
            reason: request.reason.clone(),
            actor: request.actor,
            sequence: self.version,
            occurred_at: at,
        })
    }

    /// Delta an `AJUSTE` must carry to bring the record to `counted` units.
    ///
    /// `None` when the count already matches.
    pub fn count_delta(&self, counted: i64) -> DomainResult<Option<i64>> {
        if counted < 0 {
            return Err(DomainError::validation(format!(
                "counted quantity cannot be negative (got {counted})"
            )));
        }
        let delta = counted - self.quantity;
        Ok((delta != 0).then_some(delta))
    }

    /// Replace thresholds and location. Quantity is never touched here.
    pub fn set_thresholds(
        &mut self,
        thresholds: StockThresholds,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        thresholds.validate()?;
        self.thresholds = thresholds;
        self.updated_at = at;
        Ok(())
    }
}

impl Entity for StockRecord {
    type Id = StockRecordId;

    fn entity_id(&self) -> StockRecordId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MovementKind;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn defaults() -> StockThresholds {
        StockThresholds::new(10, Some(1000), None).unwrap()
    }

    fn fresh() -> StockRecord {
        StockRecord::open(StockKey::new(ProductId::new(), WarehouseId::new()), defaults(), test_time())
            .unwrap()
    }

    #[test]
    fn entrada_then_salida_chains_entries() {
        let mut record = fresh();

        let first = record
            .apply(&MovementRequest::new(MovementKind::Entrada, 20, "receipt"), test_time())
            .unwrap();
        assert_eq!((first.stock_before, first.delta, first.stock_after), (0, 20, 20));
        assert_eq!(first.sequence, 1);

        let second = record
            .apply(&MovementRequest::new(MovementKind::Salida, 6, "sale issue"), test_time())
            .unwrap();
        assert_eq!((second.stock_before, second.delta, second.stock_after), (20, -6, 14));
        assert_eq!(second.sequence, 2);
        assert_eq!(record.quantity(), 14);
        assert!(first.is_well_formed() && second.is_well_formed());
    }

    #[test]
    fn salida_beyond_stock_is_rejected_without_change() {
        let mut record = fresh();
        record
            .apply(&MovementRequest::new(MovementKind::Entrada, 3, "receipt"), test_time())
            .unwrap();

        let err = record
            .apply(&MovementRequest::new(MovementKind::Salida, 100, "sale issue"), test_time())
            .unwrap_err();

        match &err {
            DomainError::InsufficientStock {
                product_id,
                available,
                requested,
                ..
            } => {
                assert_eq!(*product_id, record.product_id());
                assert_eq!(*available, 3);
                assert_eq!(*requested, 100);
            }
            _ => panic!("Expected InsufficientStock"),
        }
        assert_eq!(err.shortfall(), Some(97));
        assert_eq!(record.quantity(), 3);
        assert_eq!(record.version(), 1);
    }

    #[test]
    fn negative_adjustment_cannot_go_below_zero() {
        let mut record = fresh();
        let err = record
            .apply(&MovementRequest::new(MovementKind::Ajuste, -1, "shrinkage"), test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
    }

    #[test]
    fn most_negative_adjustment_is_a_validation_error() {
        let mut record = fresh();
        record
            .apply(&MovementRequest::new(MovementKind::Entrada, 7, "receipt"), test_time())
            .unwrap();

        let err = record
            .apply(&MovementRequest::new(MovementKind::Ajuste, i64::MIN, "shrinkage"), test_time())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(record.quantity(), 7);
        assert_eq!(record.version(), 1);
    }

    #[test]
    fn count_delta_reports_difference() {
        let mut record = fresh();
        record
            .apply(&MovementRequest::new(MovementKind::Entrada, 12, "receipt"), test_time())
            .unwrap();
        assert_eq!(record.count_delta(9).unwrap(), Some(-3));
        assert_eq!(record.count_delta(12).unwrap(), None);
        assert!(record.count_delta(-1).is_err());
    }

    #[test]
    fn thresholds_require_max_above_min() {
        let err = StockThresholds::new(10, Some(5), None).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("below minimum") => {}
            _ => panic!("Expected Validation error"),
        }
        assert!(StockThresholds::new(-1, None, None).is_err());
    }

    #[test]
    fn threshold_update_keeps_quantity() {
        let mut record = fresh();
        record
            .apply(&MovementRequest::new(MovementKind::Entrada, 4, "receipt"), test_time())
            .unwrap();
        assert!(record.is_below_minimum());

        record
            .set_thresholds(
                StockThresholds::new(2, None, Some("A-03".to_string())).unwrap(),
                test_time(),
            )
            .unwrap();
        assert_eq!(record.quantity(), 4);
        assert!(!record.is_below_minimum());
        assert_eq!(record.thresholds().location.as_deref(), Some("A-03"));
    }

    #[test]
    fn restore_rejects_negative_quantity() {
        let parts = StockRecordParts {
            id: StockRecordId::new(),
            product_id: ProductId::new(),
            warehouse_id: WarehouseId::new(),
            quantity: -2,
            thresholds: defaults(),
            version: 3,
            created_at: test_time(),
            updated_at: test_time(),
        };
        let err = StockRecord::restore(parts).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn stock_keys_order_by_product_first() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let w1 = WarehouseId::new();
        let w2 = WarehouseId::new();
        let mut keys = vec![StockKey::new(p2, w1), StockKey::new(p1, w2), StockKey::new(p1, w1)];
        keys.sort();
        assert_eq!(keys[0], StockKey::new(p1, w1));
        assert_eq!(keys[1], StockKey::new(p1, w2));
        assert_eq!(keys[2].product_id, p2);
    }
}
