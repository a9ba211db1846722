//! Workflow operations over the [`Store`] boundary.
//!
//! Each public operation opens one transaction, locks what it mutates, applies
//! the domain rules, and commits. Any error before the commit drops the
//! transaction, so a failed operation leaves nothing behind: no stock change,
//! no movement, no state change.
//!
//! ## Lock order
//!
//! Rows are always locked in this order, which keeps concurrent operations from
//! deadlocking each other:
//!
//! ```text
//! Purchase / Shipment
//!   ↓
//! Sale
//!   ↓
//! Stock records (ascending product, warehouse)
//!   ↓
//! Products (ascending id)
//!   ↓
//! Vehicle
//! ```
//!
//! ## Stock timing
//!
//! A sale debits stock when it is created; a purchase credits stock only when it
//! is completed. Cancelling a sale does not return its stock unless
//! `policy.restock_on_cancel` is set.

mod catalog;
mod ledger;
mod purchases;
mod sales;
mod shipments;

use std::sync::Arc;

use stockflow_core::UserId;
use stockflow_inventory::StockThresholds;

use crate::config::{PolicySettings, Settings};
use crate::error::{WorkflowError, WorkflowResult};
use crate::store::{Reference, Store, Transaction};

pub use catalog::{InitialPlacement, ProductRegistration, ProductUpdate, ShelfUpdate};
pub use ledger::StockLedger;
pub use purchases::ReceivedGoods;
pub use sales::SaleReceipt;
pub use shipments::ShipmentUpdate;

/// Entry point for every ledger, catalog and order operation.
#[derive(Clone)]
pub struct Workflows {
    store: Arc<dyn Store>,
    defaults: StockThresholds,
    policy: PolicySettings,
}

impl Workflows {
    pub fn new(store: Arc<dyn Store>, defaults: StockThresholds, policy: PolicySettings) -> Self {
        Self {
            store,
            defaults,
            policy,
        }
    }

    pub fn from_settings(store: Arc<dyn Store>, settings: &Settings) -> WorkflowResult<Self> {
        Ok(Self::new(
            store,
            settings.stock.thresholds()?,
            settings.policy.clone(),
        ))
    }

    async fn begin(&self) -> WorkflowResult<Box<dyn Transaction>> {
        Ok(self.store.begin().await?)
    }
}

/// Fail with `NotFound` unless the referenced master record exists.
async fn require(tx: &mut dyn Transaction, reference: Reference) -> WorkflowResult<()> {
    if tx.reference_exists(reference).await? {
        Ok(())
    } else {
        Err(WorkflowError::Domain(stockflow_core::DomainError::not_found(
            reference.entity(),
            reference.id_string(),
        )))
    }
}

/// The user recorded on a movement must exist when one is given.
async fn require_actor(tx: &mut dyn Transaction, actor: Option<UserId>) -> WorkflowResult<()> {
    match actor {
        Some(user_id) => require(tx, Reference::User(user_id)).await,
        None => Ok(()),
    }
}
