//! Transactional persistence boundary.
//!
//! A workflow operation opens exactly one [`Transaction`], reads and locks the
//! rows it will mutate, stages its writes, and commits. Dropping a transaction
//! without committing discards everything it staged and releases its locks.
//!
//! `lock_*` methods take a row-level exclusive lock held until commit or
//! rollback; the plain getters read without locking. Callers lock stock rows in
//! ascending [`StockKey`] order.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use stockflow_core::{
    CategoryId, CustomerId, DriverId, ProductId, PurchaseId, RouteId, SaleId, ShipmentId,
    StockRecordId, SupplierId, UserId, VehicleId, WarehouseId,
};
use stockflow_inventory::{MovementEntry, StockKey, StockRecord};
use stockflow_products::{Product, ProductStatus};
use stockflow_purchasing::Purchase;
use stockflow_sales::Sale;
use stockflow_shipping::{Shipment, Vehicle};

use crate::error::StoreError;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Master data owned outside this system, checked for existence only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Supplier(SupplierId),
    Warehouse(WarehouseId),
    User(UserId),
    Customer(CustomerId),
    Category(CategoryId),
    Driver(DriverId),
    Route(RouteId),
}

impl Reference {
    pub fn entity(&self) -> &'static str {
        match self {
            Reference::Supplier(_) => "supplier",
            Reference::Warehouse(_) => "warehouse",
            Reference::User(_) => "user",
            Reference::Customer(_) => "customer",
            Reference::Category(_) => "category",
            Reference::Driver(_) => "driver",
            Reference::Route(_) => "route",
        }
    }

    pub fn id_string(&self) -> String {
        match self {
            Reference::Supplier(id) => id.to_string(),
            Reference::Warehouse(id) => id.to_string(),
            Reference::User(id) => id.to_string(),
            Reference::Customer(id) => id.to_string(),
            Reference::Category(id) => id.to_string(),
            Reference::Driver(id) => id.to_string(),
            Reference::Route(id) => id.to_string(),
        }
    }
}

#[async_trait]
pub trait Transaction: Send {
    async fn reference_exists(&mut self, reference: Reference) -> Result<bool, StoreError>;

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, StoreError>;
    /// Fails with `StoreError::Conflict` on a duplicate SKU.
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError>;
    /// Products ordered by name, optionally restricted to one status.
    async fn products(&mut self, status: Option<ProductStatus>) -> Result<Vec<Product>, StoreError>;

    async fn stock(&mut self, key: StockKey) -> Result<Option<StockRecord>, StoreError>;
    async fn lock_stock(&mut self, key: StockKey) -> Result<Option<StockRecord>, StoreError>;
    /// Lock the record for `fresh.key()`, inserting `fresh` first when none exists.
    async fn lock_or_insert_stock(&mut self, fresh: StockRecord) -> Result<StockRecord, StoreError>;
    async fn update_stock(&mut self, record: &StockRecord) -> Result<(), StoreError>;
    async fn stock_in_warehouse(
        &mut self,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<StockRecord>, StoreError>;

    async fn append_movement(&mut self, entry: &MovementEntry) -> Result<(), StoreError>;
    /// Every movement of a product across warehouses, newest first.
    async fn movements_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<MovementEntry>, StoreError>;
    /// Movements of one record in insertion order.
    async fn movements_for_record(
        &mut self,
        record_id: StockRecordId,
    ) -> Result<Vec<MovementEntry>, StoreError>;

    async fn insert_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError>;
    async fn purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, StoreError>;
    async fn lock_purchase(&mut self, id: PurchaseId) -> Result<Option<Purchase>, StoreError>;
    async fn update_purchase(&mut self, purchase: &Purchase) -> Result<(), StoreError>;
    /// Newest first.
    async fn purchases(&mut self) -> Result<Vec<Purchase>, StoreError>;

    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError>;
    async fn sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError>;
    async fn lock_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError>;
    async fn update_sale(&mut self, sale: &Sale) -> Result<(), StoreError>;
    /// Newest first.
    async fn sales(&mut self) -> Result<Vec<Sale>, StoreError>;

    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError>;
    async fn shipment(&mut self, id: ShipmentId) -> Result<Option<Shipment>, StoreError>;
    async fn lock_shipment(&mut self, id: ShipmentId) -> Result<Option<Shipment>, StoreError>;
    async fn update_shipment(&mut self, shipment: &Shipment) -> Result<(), StoreError>;
    /// Newest first.
    async fn shipments(&mut self) -> Result<Vec<Shipment>, StoreError>;

    async fn lock_vehicle(&mut self, id: VehicleId) -> Result<Option<Vehicle>, StoreError>;
    async fn update_vehicle(&mut self, vehicle: &Vehicle) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        (**self).begin().await
    }
}
