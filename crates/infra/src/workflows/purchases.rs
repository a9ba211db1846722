//! Purchase workflow: draft, then complete (credits stock) or void.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use stockflow_core::{DomainError, Money, ProductId, PurchaseId, SupplierId, WarehouseId};
use stockflow_inventory::{MovementKind, MovementRequest, StockKey};
use stockflow_purchasing::{NewPurchase, Purchase, PurchaseStatus};

use super::{StockLedger, Workflows, require};
use crate::error::WorkflowResult;
use crate::store::{Reference, Transaction};

/// Goods received into a warehouse from completed purchases, per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedGoods {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Unit price on the most recent completed purchase.
    pub last_unit_price: Money,
    pub suppliers: Vec<SupplierId>,
}

impl Workflows {
    /// Record a purchase in `PENDIENTE`. Stock is untouched.
    #[instrument(
        skip(self, draft),
        fields(supplier_id = %draft.supplier_id, warehouse_id = %draft.warehouse_id),
        err
    )]
    pub async fn create_purchase(&self, draft: NewPurchase) -> WorkflowResult<Purchase> {
        let purchase = Purchase::open(draft, Utc::now())?;

        let mut tx = self.begin().await?;
        require(tx.as_mut(), Reference::Supplier(purchase.supplier_id)).await?;
        require(tx.as_mut(), Reference::Warehouse(purchase.warehouse_id)).await?;
        require(tx.as_mut(), Reference::User(purchase.buyer_id)).await?;

        let products: BTreeSet<ProductId> =
            purchase.lines.iter().map(|line| line.product_id).collect();
        for product_id in products {
            if tx.product(product_id).await?.is_none() {
                return Err(DomainError::not_found("product", product_id).into());
            }
        }

        tx.insert_purchase(&purchase).await?;
        tx.commit().await?;

        info!(purchase_id = %purchase.id, total = %purchase.total, "purchase recorded");
        Ok(purchase)
    }

    /// Move a purchase to `COMPLETADA` or `ANULADA`.
    ///
    /// Completion credits every line to stock (`ENTRADA`), refreshes each
    /// product's purchase price and activates catalog-only products, all in one
    /// transaction. Voiding touches nothing but the status.
    #[instrument(skip_all, fields(purchase_id = %id, next = %next), err)]
    pub async fn set_purchase_state(
        &self,
        id: PurchaseId,
        next: PurchaseStatus,
    ) -> WorkflowResult<Purchase> {
        let mut tx = self.begin().await?;
        let mut purchase = tx
            .lock_purchase(id)
            .await?
            .ok_or_else(|| DomainError::not_found("purchase", id))?;

        purchase.transition(next, Utc::now())?;

        if next == PurchaseStatus::Completada {
            self.receive(tx.as_mut(), &purchase).await?;
        }

        tx.update_purchase(&purchase).await?;
        tx.commit().await?;

        info!(purchase_id = %id, status = %purchase.status, "purchase state changed");
        Ok(purchase)
    }

    async fn receive(&self, tx: &mut dyn Transaction, purchase: &Purchase) -> WorkflowResult<()> {
        let reason = purchase.receipt_reason();

        let keys: BTreeSet<StockKey> = purchase
            .lines
            .iter()
            .map(|line| StockKey::new(line.product_id, purchase.warehouse_id))
            .collect();
        let mut records = BTreeMap::new();
        for key in keys {
            let record = StockLedger::get_or_create(tx, key, &self.defaults).await?;
            records.insert(key, record);
        }

        for line in &purchase.lines {
            let key = StockKey::new(line.product_id, purchase.warehouse_id);
            let Some(record) = records.get_mut(&key) else {
                return Err(DomainError::not_found("stock record", key).into());
            };
            let request = MovementRequest::new(MovementKind::Entrada, line.quantity, reason.as_str())
                .by(Some(purchase.buyer_id));
            StockLedger::apply_movement(tx, record, &request).await?;
        }

        // Last line wins when a product appears on several lines.
        let unit_costs: BTreeMap<ProductId, Money> = purchase
            .lines
            .iter()
            .map(|line| (line.product_id, line.unit_price))
            .collect();
        let now = Utc::now();
        for (product_id, unit_cost) in unit_costs {
            let mut product = tx
                .lock_product(product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("product", product_id))?;
            if product.mark_received(unit_cost, now) {
                info!(product_id = %product_id, "catalog product activated by receipt");
            }
            tx.update_product(&product).await?;
        }
        Ok(())
    }

    pub async fn purchase(&self, id: PurchaseId) -> WorkflowResult<Purchase> {
        let mut tx = self.begin().await?;
        let purchase = tx
            .purchase(id)
            .await?
            .ok_or_else(|| DomainError::not_found("purchase", id))?;
        tx.rollback().await?;
        Ok(purchase)
    }

    /// All purchases, newest first.
    pub async fn purchases(&self) -> WorkflowResult<Vec<Purchase>> {
        let mut tx = self.begin().await?;
        let purchases = tx.purchases().await?;
        tx.rollback().await?;
        Ok(purchases)
    }

    /// Totals received into `warehouse_id` by completed purchases, by product.
    pub async fn received_by_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> WorkflowResult<Vec<ReceivedGoods>> {
        let mut tx = self.begin().await?;
        require(tx.as_mut(), Reference::Warehouse(warehouse_id)).await?;
        let purchases = tx.purchases().await?;
        tx.rollback().await?;

        let mut received: BTreeMap<ProductId, ReceivedGoods> = BTreeMap::new();
        // Newest first, so the first price seen per product is the latest.
        for purchase in purchases.iter().filter(|p| {
            p.warehouse_id == warehouse_id && p.status == PurchaseStatus::Completada
        }) {
            for line in &purchase.lines {
                let goods = received
                    .entry(line.product_id)
                    .or_insert_with(|| ReceivedGoods {
                        product_id: line.product_id,
                        quantity: 0,
                        last_unit_price: line.unit_price,
                        suppliers: Vec::new(),
                    });
                goods.quantity += line.quantity;
                if !goods.suppliers.contains(&purchase.supplier_id) {
                    goods.suppliers.push(purchase.supplier_id);
                }
            }
        }
        Ok(received.into_values().collect())
    }
}
