//! Stock ledger: per-(product, warehouse) snapshots and their movement log.
//!
//! [`StockLedger::apply_movement`] is the only place a quantity changes. It
//! writes the updated record and the matching movement through the same
//! transaction, so the two commit or roll back together.

use chrono::Utc;
use tracing::{info, instrument, warn};

use stockflow_core::{DomainError, ProductId, UserId, WarehouseId};
use stockflow_inventory::{
    MovementEntry, MovementKind, MovementRequest, Reconciliation, StockKey, StockRecord,
    StockThresholds, replay,
};

use super::{Workflows, require, require_actor};
use crate::error::WorkflowResult;
use crate::store::{Reference, Transaction};

/// Ledger primitives composed by the workflows inside their own transaction.
pub struct StockLedger;

impl StockLedger {
    /// Lock the record for `key`, creating it at quantity 0 with `defaults` when absent.
    pub async fn get_or_create(
        tx: &mut dyn Transaction,
        key: StockKey,
        defaults: &StockThresholds,
    ) -> WorkflowResult<StockRecord> {
        let fresh = StockRecord::open(key, defaults.clone(), Utc::now())?;
        Ok(tx.lock_or_insert_stock(fresh).await?)
    }

    /// Lock an existing record; `NotFound` when the product never entered the warehouse.
    pub async fn lock_existing(
        tx: &mut dyn Transaction,
        key: StockKey,
    ) -> WorkflowResult<StockRecord> {
        tx.lock_stock(key)
            .await?
            .ok_or_else(|| DomainError::not_found("stock record", key).into())
    }

    /// Apply one movement to a locked record and append its log entry.
    ///
    /// On `InsufficientStock` nothing is written and `record` is unchanged.
    pub async fn apply_movement(
        tx: &mut dyn Transaction,
        record: &mut StockRecord,
        request: &MovementRequest,
    ) -> WorkflowResult<MovementEntry> {
        let entry = record.apply(request, Utc::now()).inspect_err(|err| {
            if let Some(shortfall) = err.shortfall() {
                warn!(
                    stock = %record.key(),
                    kind = %request.kind,
                    shortfall,
                    "stock movement rejected"
                );
            }
        })?;

        tx.update_stock(record).await?;
        tx.append_movement(&entry).await?;

        info!(
            stock = %record.key(),
            kind = %entry.kind,
            delta = entry.delta,
            stock_after = entry.stock_after,
            "stock moved"
        );
        Ok(entry)
    }

    /// Every movement of `product_id` across warehouses, newest first.
    pub async fn history(
        tx: &mut dyn Transaction,
        product_id: ProductId,
    ) -> WorkflowResult<Vec<MovementEntry>> {
        Ok(tx.movements_for_product(product_id).await?)
    }
}

impl Workflows {
    /// Current quantity and thresholds for one product in one warehouse.
    pub async fn stock_level(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> WorkflowResult<StockRecord> {
        let key = StockKey::new(product_id, warehouse_id);
        let mut tx = self.begin().await?;
        let record = tx
            .stock(key)
            .await?
            .ok_or_else(|| DomainError::not_found("stock record", key))?;
        tx.rollback().await?;
        Ok(record)
    }

    pub async fn history(&self, product_id: ProductId) -> WorkflowResult<Vec<MovementEntry>> {
        let mut tx = self.begin().await?;
        let entries = StockLedger::history(tx.as_mut(), product_id).await?;
        tx.rollback().await?;
        Ok(entries)
    }

    /// Manual correction by a signed delta on an existing record.
    #[instrument(skip(self, reason), fields(stock = %key), err)]
    pub async fn adjust_stock(
        &self,
        key: StockKey,
        delta: i64,
        reason: String,
        actor: Option<UserId>,
    ) -> WorkflowResult<MovementEntry> {
        let request = MovementRequest::new(MovementKind::Ajuste, delta, reason).by(actor);
        request.delta()?;

        let mut tx = self.begin().await?;
        require_actor(tx.as_mut(), actor).await?;
        let mut record = StockLedger::lock_existing(tx.as_mut(), key).await?;
        let entry = StockLedger::apply_movement(tx.as_mut(), &mut record, &request).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Physical count: bring the record to `counted` with one `AJUSTE`.
    ///
    /// Returns `None` (and records nothing) when the count already matches.
    #[instrument(skip(self), fields(stock = %key), err)]
    pub async fn count_stock(
        &self,
        key: StockKey,
        counted: i64,
        actor: Option<UserId>,
    ) -> WorkflowResult<Option<MovementEntry>> {
        let mut tx = self.begin().await?;
        require_actor(tx.as_mut(), actor).await?;
        let mut record = StockLedger::lock_existing(tx.as_mut(), key).await?;

        let Some(delta) = record.count_delta(counted)? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let request = MovementRequest::new(
            MovementKind::Ajuste,
            delta,
            format!("physical count: {counted} units"),
        )
        .by(actor);
        let entry = StockLedger::apply_movement(tx.as_mut(), &mut record, &request).await?;
        tx.commit().await?;
        Ok(Some(entry))
    }

    /// Replace min/max thresholds and shelf location. Quantity is untouched.
    #[instrument(skip(self, thresholds), fields(stock = %key), err)]
    pub async fn update_thresholds(
        &self,
        key: StockKey,
        thresholds: StockThresholds,
    ) -> WorkflowResult<StockRecord> {
        let mut tx = self.begin().await?;
        let mut record = StockLedger::lock_existing(tx.as_mut(), key).await?;
        record.set_thresholds(thresholds, Utc::now())?;
        tx.update_stock(&record).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Records of `warehouse_id` whose quantity is below their minimum.
    pub async fn low_stock(&self, warehouse_id: WarehouseId) -> WorkflowResult<Vec<StockRecord>> {
        let mut tx = self.begin().await?;
        require(tx.as_mut(), Reference::Warehouse(warehouse_id)).await?;
        let low = tx
            .stock_in_warehouse(warehouse_id)
            .await?
            .into_iter()
            .filter(StockRecord::is_below_minimum)
            .collect();
        tx.rollback().await?;
        Ok(low)
    }

    /// Replay a record's movement log from 0 and compare with the stored quantity.
    #[instrument(skip(self), fields(stock = %key), err)]
    pub async fn reconcile(&self, key: StockKey) -> WorkflowResult<Reconciliation> {
        let mut tx = self.begin().await?;
        let record = tx
            .stock(key)
            .await?
            .ok_or_else(|| DomainError::not_found("stock record", key))?;
        let entries = tx.movements_for_record(record.id()).await?;
        tx.rollback().await?;

        let report = replay(record.id(), record.quantity(), &entries);
        if !report.is_consistent() {
            warn!(
                stock = %key,
                stored = report.stored_quantity,
                replayed = report.replayed_quantity,
                breaks = report.breaks.len(),
                "stock ledger out of balance"
            );
        }
        Ok(report)
    }
}
