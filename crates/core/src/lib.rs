//! `stockflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the ledger and the
//! order workflows (no infrastructure concerns).

pub mod entity;
pub mod enumeration;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    CategoryId, CustomerId, DriverId, MovementId, ProductId, PurchaseId, RouteId, SaleId,
    ShipmentId, StockRecordId, SupplierId, UserId, VehicleId, WarehouseId,
};
pub use lifecycle::Lifecycle;
pub use value_object::Money;
