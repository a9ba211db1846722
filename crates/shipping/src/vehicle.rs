use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{Entity, VehicleId, wire_enum};

wire_enum! {
    pub enum VehicleStatus: "vehicle status" {
        Disponible => "DISPONIBLE",
        EnRuta => "EN_RUTA",
        Mantenimiento => "MANTENIMIENTO",
        Inactivo => "INACTIVO",
    }
}

/// Delivery vehicle. Master data is maintained elsewhere; shipments only move
/// its availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub plate: String,
    pub status: VehicleStatus,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(plate: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: VehicleId::new(),
            plate: plate.into(),
            status: VehicleStatus::Disponible,
            updated_at: at,
        }
    }

    /// Returns whether the status changed.
    pub fn set_status(&mut self, status: VehicleStatus, at: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.updated_at = at;
        true
    }
}

impl Entity for Vehicle {
    type Id = VehicleId;

    fn entity_id(&self) -> VehicleId {
        self.id
    }
}
