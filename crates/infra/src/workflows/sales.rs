//! Sale workflow: stock is debited when the sale is created.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use stockflow_core::{DomainError, ProductId, SaleId};
use stockflow_inventory::{MovementKind, MovementRequest, StockKey, StockRecord};
use stockflow_sales::{NewSale, Sale, SaleStatus};
use stockflow_shipping::{Delivery, Shipment};

use super::{StockLedger, Workflows, require};
use crate::error::WorkflowResult;
use crate::store::{Reference, Transaction};

/// A created sale and, when delivery was requested, its shipment.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub shipment: Option<Shipment>,
}

/// Lock the records behind `sale`'s lines in ascending key order.
async fn lock_sale_stock(
    tx: &mut dyn Transaction,
    sale: &Sale,
) -> WorkflowResult<BTreeMap<StockKey, StockRecord>> {
    let keys: BTreeSet<StockKey> = sale
        .lines
        .iter()
        .map(|line| StockKey::new(line.product_id, sale.warehouse_id))
        .collect();

    let mut records = BTreeMap::new();
    for key in keys {
        records.insert(key, StockLedger::lock_existing(tx, key).await?);
    }
    Ok(records)
}

/// Apply one movement of `kind` per sale line against already locked records.
async fn move_sale_lines(
    tx: &mut dyn Transaction,
    sale: &Sale,
    records: &mut BTreeMap<StockKey, StockRecord>,
    kind: MovementKind,
    reason: &str,
) -> WorkflowResult<()> {
    for line in &sale.lines {
        let key = StockKey::new(line.product_id, sale.warehouse_id);
        let Some(record) = records.get_mut(&key) else {
            return Err(DomainError::not_found("stock record", key).into());
        };
        let request =
            MovementRequest::new(kind, line.quantity, reason).by(Some(sale.seller_id));
        StockLedger::apply_movement(tx, record, &request).await?;
    }
    Ok(())
}

impl Workflows {
    /// Create a sale, debiting every line from stock.
    ///
    /// All lines are debited or none: the first line that would drive a record
    /// below zero fails the whole sale with `InsufficientStock`. With a
    /// `delivery` the sale starts `PENDIENTE` and a shipment is created in the
    /// same transaction; without one it is `COMPLETADA` immediately.
    #[instrument(
        skip(self, draft, delivery),
        fields(warehouse_id = %draft.warehouse_id, lines = draft.lines.len(), delivery = delivery.is_some()),
        err
    )]
    pub async fn create_sale(
        &self,
        draft: NewSale,
        delivery: Option<Delivery>,
    ) -> WorkflowResult<SaleReceipt> {
        let sale = Sale::open(draft, delivery.is_some(), Utc::now())?;

        let mut tx = self.begin().await?;
        require(tx.as_mut(), Reference::Warehouse(sale.warehouse_id)).await?;
        require(tx.as_mut(), Reference::User(sale.seller_id)).await?;
        if let Some(customer_id) = sale.customer_id {
            require(tx.as_mut(), Reference::Customer(customer_id)).await?;
        }

        let products: BTreeSet<ProductId> = sale.lines.iter().map(|line| line.product_id).collect();
        for product_id in products {
            if tx.product(product_id).await?.is_none() {
                return Err(DomainError::not_found("product", product_id).into());
            }
        }

        let mut records = lock_sale_stock(tx.as_mut(), &sale).await?;
        let reason = sale.issue_reason();
        move_sale_lines(tx.as_mut(), &sale, &mut records, MovementKind::Salida, &reason).await?;

        tx.insert_sale(&sale).await?;

        let shipment = match delivery {
            Some(delivery) => {
                Some(super::shipments::open_shipment(tx.as_mut(), Some(sale.id), delivery).await?)
            }
            None => None,
        };

        tx.commit().await?;

        info!(sale_id = %sale.id, status = %sale.status, total = %sale.total, "sale recorded");
        Ok(SaleReceipt { sale, shipment })
    }

    /// Administrative status override.
    ///
    /// The debit made at creation stays in place unless
    /// `policy.restock_on_cancel` is set, in which case reaching `ANULADA`
    /// returns every line with a `DEVOLUCION` movement.
    #[instrument(skip_all, fields(sale_id = %id, next = %next), err)]
    pub async fn set_sale_state(&self, id: SaleId, next: SaleStatus) -> WorkflowResult<Sale> {
        let mut tx = self.begin().await?;
        let mut sale = tx
            .lock_sale(id)
            .await?
            .ok_or_else(|| DomainError::not_found("sale", id))?;

        sale.transition(next, Utc::now())?;
        if next == SaleStatus::Anulada && self.policy.restock_on_cancel {
            restock(tx.as_mut(), &sale).await?;
        }

        tx.update_sale(&sale).await?;
        tx.commit().await?;

        info!(sale_id = %id, status = %sale.status, "sale state changed");
        Ok(sale)
    }

    pub async fn sale(&self, id: SaleId) -> WorkflowResult<Sale> {
        let mut tx = self.begin().await?;
        let sale = tx
            .sale(id)
            .await?
            .ok_or_else(|| DomainError::not_found("sale", id))?;
        tx.rollback().await?;
        Ok(sale)
    }

    /// All sales, newest first.
    pub async fn sales(&self) -> WorkflowResult<Vec<Sale>> {
        let mut tx = self.begin().await?;
        let sales = tx.sales().await?;
        tx.rollback().await?;
        Ok(sales)
    }
}

/// Return a cancelled sale's lines to stock.
pub(super) async fn restock(tx: &mut dyn Transaction, sale: &Sale) -> WorkflowResult<()> {
    let mut records = lock_sale_stock(tx, sale).await?;
    let reason = sale.return_reason();
    move_sale_lines(tx, sale, &mut records, MovementKind::Devolucion, &reason).await?;
    info!(sale_id = %sale.id, "cancelled sale returned to stock");
    Ok(())
}
