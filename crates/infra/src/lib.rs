//! Infrastructure layer: persistence, configuration and the workflows that
//! drive the domain crates inside one transaction per operation.

pub mod config;
pub mod error;
pub mod store;
pub mod workflows;


pub use error::{StoreError, WorkflowError, WorkflowResult};
pub use store::{InMemoryStore, PostgresStore, Reference, Store, Transaction};
pub use workflows::{
    InitialPlacement, ProductRegistration, ProductUpdate, ReceivedGoods, SaleReceipt,
    ShelfUpdate, ShipmentUpdate, StockLedger, Workflows,
};
