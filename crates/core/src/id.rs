//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_id!(
    /// Product (catalog entry).
    ProductId,
    "ProductId"
);
uuid_id!(
    /// Warehouse (reference record, owned outside the core).
    WarehouseId,
    "WarehouseId"
);
uuid_id!(SupplierId, "SupplierId");
uuid_id!(CustomerId, "CustomerId");
uuid_id!(
    /// Application user acting as buyer, seller or movement actor.
    UserId,
    "UserId"
);
uuid_id!(CategoryId, "CategoryId");
uuid_id!(VehicleId, "VehicleId");
uuid_id!(DriverId, "DriverId");
uuid_id!(RouteId, "RouteId");
uuid_id!(
    /// One stock snapshot row per (product, warehouse).
    StockRecordId,
    "StockRecordId"
);
uuid_id!(MovementId, "MovementId");
uuid_id!(PurchaseId, "PurchaseId");
uuid_id!(SaleId, "SaleId");
uuid_id!(ShipmentId, "ShipmentId");
