//! Inventory domain module: the stock ledger's pure half.
//!
//! A `StockRecord` is the current-quantity snapshot for one (product, warehouse)
//! pair and `MovementEntry` is the immutable log line describing each change to
//! it. `StockRecord::apply` is the only way a quantity moves, and it always
//! yields exactly one entry. Persisting both in one transaction is the caller's
//! job (see `stockflow-infra`).

pub mod movement;
pub mod reconcile;
pub mod stock;

pub use movement::{MovementEntry, MovementKind, MovementRequest};
pub use reconcile::{ChainBreak, Reconciliation, replay};
pub use stock::{StockKey, StockRecord, StockRecordParts, StockThresholds};
