//! Sales domain module.
//!
//! Unlike a purchase, a sale debits stock when it is created; its status only
//! records whether fulfilment (delivery) is still in flight.

pub mod sale;

pub use sale::{NewSale, NewSaleLine, Sale, SaleLine, SaleStatus};
