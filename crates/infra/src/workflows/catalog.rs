//! Product registration and catalog maintenance.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use stockflow_core::{DomainError, ProductId, UserId, WarehouseId};
use stockflow_inventory::{MovementKind, MovementRequest, StockKey, StockRecord, StockThresholds};
use stockflow_products::{CatalogEntry, NewProduct, Product, ProductEdit, ProductStatus};

use super::{StockLedger, Workflows, require, require_actor};
use crate::error::WorkflowResult;
use crate::store::{Reference, Transaction};

const INITIAL_STOCK_REASON: &str = "initial stock on product registration";

/// Where a newly registered product is first shelved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialPlacement {
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub quantity: i64,
    /// Falls back to the configured defaults.
    #[serde(default)]
    pub thresholds: Option<StockThresholds>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductRegistration {
    pub product: Product,
    pub stock: Option<StockRecord>,
}

/// New thresholds and location for a product's record in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfUpdate {
    pub warehouse_id: WarehouseId,
    pub thresholds: StockThresholds,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductUpdate {
    pub product: Product,
    pub stock: Option<StockRecord>,
}

async fn ensure_sku_free(tx: &mut dyn Transaction, sku: &str) -> WorkflowResult<()> {
    if tx.product_by_sku(sku).await?.is_some() {
        return Err(DomainError::conflict(format!("sku '{sku}' is already registered")).into());
    }
    Ok(())
}

impl Workflows {
    /// Register an `ACTIVE` product, optionally shelving it in a warehouse.
    ///
    /// A positive initial quantity is recorded as one `ENTRADA`.
    #[instrument(skip(self, draft, placement), fields(sku = %draft.sku), err)]
    pub async fn register_product(
        &self,
        draft: NewProduct,
        placement: Option<InitialPlacement>,
        actor: Option<UserId>,
    ) -> WorkflowResult<ProductRegistration> {
        let product = Product::register(draft, Utc::now())?;
        if let Some(placement) = &placement {
            if placement.quantity < 0 {
                return Err(DomainError::validation(format!(
                    "initial quantity cannot be negative (got {})",
                    placement.quantity
                ))
                .into());
            }
        }

        let mut tx = self.begin().await?;
        ensure_sku_free(tx.as_mut(), &product.sku).await?;
        if let Some(category_id) = product.category_id {
            require(tx.as_mut(), Reference::Category(category_id)).await?;
        }
        require_actor(tx.as_mut(), actor).await?;
        tx.insert_product(&product).await?;

        let stock = match placement {
            Some(placement) => {
                require(tx.as_mut(), Reference::Warehouse(placement.warehouse_id)).await?;
                let key = StockKey::new(product.id, placement.warehouse_id);
                let thresholds = placement.thresholds.unwrap_or_else(|| self.defaults.clone());
                let fresh = StockRecord::open(key, thresholds, Utc::now())?;
                let mut record = tx.lock_or_insert_stock(fresh).await?;
                if placement.quantity > 0 {
                    let request = MovementRequest::new(
                        MovementKind::Entrada,
                        placement.quantity,
                        INITIAL_STOCK_REASON,
                    )
                    .by(actor);
                    StockLedger::apply_movement(tx.as_mut(), &mut record, &request).await?;
                }
                Some(record)
            }
            None => None,
        };

        tx.commit().await?;

        info!(product_id = %product.id, sku = %product.sku, "product registered");
        Ok(ProductRegistration { product, stock })
    }

    /// Register a product a supplier offers but nobody has received yet.
    #[instrument(skip(self, entry), fields(sku = %entry.sku, supplier_id = %entry.supplier_id), err)]
    pub async fn register_catalog_product(&self, entry: CatalogEntry) -> WorkflowResult<Product> {
        let supplier_id = entry.supplier_id;
        let product = Product::from_catalog(entry, Utc::now())?;

        let mut tx = self.begin().await?;
        require(tx.as_mut(), Reference::Supplier(supplier_id)).await?;
        ensure_sku_free(tx.as_mut(), &product.sku).await?;
        if let Some(category_id) = product.category_id {
            require(tx.as_mut(), Reference::Category(category_id)).await?;
        }
        tx.insert_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %product.id, supplier_id = %supplier_id, "catalog product registered");
        Ok(product)
    }

    /// Switch a product between `ACTIVE` and `INACTIVE`.
    #[instrument(skip_all, fields(product_id = %id, status = %status), err)]
    pub async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> WorkflowResult<Product> {
        let mut tx = self.begin().await?;
        let mut product = tx
            .lock_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;

        if product.set_status(status, Utc::now())? {
            tx.update_product(&product).await?;
            tx.commit().await?;
            info!(product_id = %id, status = %status, "product status changed");
        } else {
            tx.rollback().await?;
        }
        Ok(product)
    }

    /// Edit a product's descriptive fields, prices, unit and category, and
    /// optionally the thresholds of its record in one warehouse.
    ///
    /// Status and stock quantity are never touched. A SKU held by another
    /// product is a `Conflict`.
    #[instrument(skip_all, fields(product_id = %id), err)]
    pub async fn update_product(
        &self,
        id: ProductId,
        edit: ProductEdit,
        shelf: Option<ShelfUpdate>,
    ) -> WorkflowResult<ProductUpdate> {
        let mut tx = self.begin().await?;
        if tx.product(id).await?.is_none() {
            return Err(DomainError::not_found("product", id).into());
        }

        let now = Utc::now();
        let stock = match shelf {
            Some(shelf) => {
                let key = StockKey::new(id, shelf.warehouse_id);
                let mut record = StockLedger::lock_existing(tx.as_mut(), key).await?;
                record.set_thresholds(shelf.thresholds, now)?;
                tx.update_stock(&record).await?;
                Some(record)
            }
            None => None,
        };

        let mut product = tx
            .lock_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        product.amend(edit, now)?;

        if let Some(holder) = tx.product_by_sku(&product.sku).await? {
            if holder.id != id {
                return Err(DomainError::conflict(format!(
                    "sku '{}' is already registered",
                    product.sku
                ))
                .into());
            }
        }
        if let Some(category_id) = product.category_id {
            require(tx.as_mut(), Reference::Category(category_id)).await?;
        }

        tx.update_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %id, sku = %product.sku, "product updated");
        Ok(ProductUpdate { product, stock })
    }

    pub async fn product(&self, id: ProductId) -> WorkflowResult<Product> {
        let mut tx = self.begin().await?;
        let product = tx
            .product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        tx.rollback().await?;
        Ok(product)
    }

    /// Products that may appear on a sale: `ACTIVE` only, by name.
    pub async fn products_for_sale(&self) -> WorkflowResult<Vec<Product>> {
        let mut tx = self.begin().await?;
        let products = tx.products(Some(ProductStatus::Active)).await?;
        tx.rollback().await?;
        Ok(products)
    }
}
