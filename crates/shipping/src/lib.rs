//! Shipping domain module.
//!
//! Shipment lifecycle plus the effects each transition has on the sale it
//! carries and the vehicle assigned to it. The effects are returned as data;
//! applying them in the same transaction is the workflow's job.

pub mod shipment;
pub mod vehicle;

pub use shipment::{Cascade, Delivery, Shipment, ShipmentStatus};
pub use vehicle::{Vehicle, VehicleStatus};
