//! Purchasing domain module.
//!
//! A purchase is drafted in `PENDIENTE` with no stock effect; only completion
//! credits the ledger (done by the workflow in `stockflow-infra`).

pub mod purchase;

pub use purchase::{
    NewPurchase, NewPurchaseLine, Purchase, PurchaseLine, PurchaseStatus, Voucher,
};
