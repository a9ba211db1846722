use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{
    DomainError, DomainResult, DriverId, Entity, Lifecycle, Money, RouteId, SaleId, ShipmentId,
    VehicleId, wire_enum,
};
use stockflow_sales::SaleStatus;

use crate::vehicle::VehicleStatus;

wire_enum! {
    /// Shipment lifecycle:
    /// `PENDIENTE -> EN_RUTA -> ENTREGADO`, with `CANCELADO` reachable from
    /// `PENDIENTE` or `EN_RUTA`.
    pub enum ShipmentStatus: "shipment status" {
        Pendiente => "PENDIENTE",
        EnRuta => "EN_RUTA",
        Entregado => "ENTREGADO",
        Cancelado => "CANCELADO",
    }
}

impl Lifecycle for ShipmentStatus {
    const ENTITY: &'static str = "shipment";

    fn can_transition_to(self, next: Self) -> bool {
        use ShipmentStatus::*;
        matches!(
            (self, next),
            (Pendiente, EnRuta) | (Pendiente, Cancelado) | (EnRuta, Entregado) | (EnRuta, Cancelado)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Entregado | ShipmentStatus::Cancelado)
    }
}

/// Side effects of a shipment transition on its collaborators.
///
/// Only collaborators the shipment actually references appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cascade {
    pub sale: Option<(SaleId, SaleStatus)>,
    pub vehicle: Option<(VehicleId, VehicleStatus)>,
}

impl Cascade {
    fn for_status(next: ShipmentStatus) -> (Option<SaleStatus>, Option<VehicleStatus>) {
        match next {
            ShipmentStatus::Pendiente => (None, None),
            ShipmentStatus::EnRuta => (None, Some(VehicleStatus::EnRuta)),
            ShipmentStatus::Entregado => (Some(SaleStatus::Completada), Some(VehicleStatus::Disponible)),
            ShipmentStatus::Cancelado => (Some(SaleStatus::Anulada), Some(VehicleStatus::Disponible)),
        }
    }
}

/// Delivery details supplied when a shipment is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub address: String,
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    #[serde(default)]
    pub route_id: Option<RouteId>,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub transport_cost: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Trimmed address and transport cost of a delivery, validated.
fn checked_details(delivery: &Delivery) -> DomainResult<(String, Money)> {
    let address = delivery.address.trim();
    if address.is_empty() {
        return Err(DomainError::validation("delivery address cannot be empty"));
    }
    let transport_cost = delivery.transport_cost.ensure_non_negative("transport_cost")?;
    Ok((address.to_string(), transport_cost))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub sale_id: Option<SaleId>,
    pub address: String,
    pub vehicle_id: Option<VehicleId>,
    pub driver_id: Option<DriverId>,
    pub route_id: Option<RouteId>,
    pub scheduled_date: NaiveDate,
    pub delivered_date: Option<NaiveDate>,
    pub transport_cost: Money,
    pub notes: Option<String>,
    pub status: ShipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn open(
        sale_id: Option<SaleId>,
        delivery: Delivery,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let (address, transport_cost) = checked_details(&delivery)?;

        Ok(Self {
            id: ShipmentId::new(),
            sale_id,
            address,
            vehicle_id: delivery.vehicle_id,
            driver_id: delivery.driver_id,
            route_id: delivery.route_id,
            scheduled_date: delivery.scheduled_date,
            delivered_date: None,
            transport_cost,
            notes: delivery.notes,
            status: ShipmentStatus::Pendiente,
            created_at: at,
            updated_at: at,
        })
    }

    /// Replace the delivery details of a shipment that has not left yet.
    ///
    /// Only a `PENDIENTE` shipment can be edited; any other status is an
    /// `InvalidTransition` to `EDITED`.
    pub fn amend(&mut self, delivery: Delivery, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != ShipmentStatus::Pendiente {
            return Err(DomainError::invalid_transition(
                ShipmentStatus::ENTITY,
                self.id,
                self.status,
                "EDITED",
            ));
        }
        let (address, transport_cost) = checked_details(&delivery)?;

        self.address = address;
        self.vehicle_id = delivery.vehicle_id;
        self.driver_id = delivery.driver_id;
        self.route_id = delivery.route_id;
        self.scheduled_date = delivery.scheduled_date;
        self.transport_cost = transport_cost;
        self.notes = delivery.notes;
        self.updated_at = at;
        Ok(())
    }

    /// Move to `next`, stamping the delivery date on `ENTREGADO`, and return the
    /// effects on the sale and vehicle.
    pub fn transition(&mut self, next: ShipmentStatus, at: DateTime<Utc>) -> DomainResult<Cascade> {
        self.status.ensure_transition(self.id, next)?;
        self.status = next;
        self.updated_at = at;
        if next == ShipmentStatus::Entregado {
            self.delivered_date = Some(at.date_naive());
        }

        let (sale, vehicle) = Cascade::for_status(next);
        Ok(Cascade {
            sale: self.sale_id.zip(sale),
            vehicle: self.vehicle_id.zip(vehicle),
        })
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    fn entity_id(&self) -> ShipmentId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn delivery(vehicle: Option<VehicleId>) -> Delivery {
        Delivery {
            address: "  Av. Arequipa 1234, Lima ".to_string(),
            vehicle_id: vehicle,
            driver_id: None,
            route_id: None,
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            transport_cost: Money::from_minor(1500),
            notes: None,
        }
    }

    #[test]
    fn open_trims_address_and_starts_pending() {
        let shipment = Shipment::open(Some(SaleId::new()), delivery(None), test_time()).unwrap();
        assert_eq!(shipment.address, "Av. Arequipa 1234, Lima");
        assert_eq!(shipment.status, ShipmentStatus::Pendiente);
        assert!(shipment.delivered_date.is_none());
    }

    #[test]
    fn blank_address_is_rejected() {
        let mut d = delivery(None);
        d.address = "  ".to_string();
        let err = Shipment::open(None, d, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn delivery_cascades_to_sale_and_vehicle() {
        let sale_id = SaleId::new();
        let vehicle_id = VehicleId::new();
        let mut shipment = Shipment::open(Some(sale_id), delivery(Some(vehicle_id)), test_time()).unwrap();

        let on_route = shipment.transition(ShipmentStatus::EnRuta, test_time()).unwrap();
        assert_eq!(on_route.sale, None);
        assert_eq!(on_route.vehicle, Some((vehicle_id, VehicleStatus::EnRuta)));

        let now = test_time();
        let delivered = shipment.transition(ShipmentStatus::Entregado, now).unwrap();
        assert_eq!(delivered.sale, Some((sale_id, SaleStatus::Completada)));
        assert_eq!(delivered.vehicle, Some((vehicle_id, VehicleStatus::Disponible)));
        assert_eq!(shipment.delivered_date, Some(now.date_naive()));
    }

    #[test]
    fn cancellation_without_vehicle_only_touches_sale() {
        let sale_id = SaleId::new();
        let mut shipment = Shipment::open(Some(sale_id), delivery(None), test_time()).unwrap();

        let effects = shipment.transition(ShipmentStatus::Cancelado, test_time()).unwrap();
        assert_eq!(effects.sale, Some((sale_id, SaleStatus::Anulada)));
        assert_eq!(effects.vehicle, None);
    }

    #[test]
    fn pending_cannot_jump_to_delivered() {
        let mut shipment = Shipment::open(None, delivery(None), test_time()).unwrap();
        let err = shipment
            .transition(ShipmentStatus::Entregado, test_time())
            .unwrap_err();
        match err {
            DomainError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "PENDIENTE");
                assert_eq!(to, "ENTREGADO");
            }
            _ => panic!("Expected InvalidTransition"),
        }
        assert_eq!(shipment.status, ShipmentStatus::Pendiente);
    }

    #[test]
    fn pending_shipment_can_be_rescheduled() {
        let mut shipment = Shipment::open(None, delivery(None), test_time()).unwrap();
        let vehicle_id = VehicleId::new();
        let mut change = delivery(Some(vehicle_id));
        change.address = "Jr. Puno 455".to_string();
        change.scheduled_date = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();

        shipment.amend(change, test_time()).unwrap();
        assert_eq!(shipment.address, "Jr. Puno 455");
        assert_eq!(shipment.vehicle_id, Some(vehicle_id));
        assert_eq!(shipment.scheduled_date, NaiveDate::from_ymd_opt(2026, 3, 20).unwrap());
        assert_eq!(shipment.status, ShipmentStatus::Pendiente);
    }

    #[test]
    fn shipment_on_route_cannot_be_edited() {
        let mut shipment = Shipment::open(None, delivery(None), test_time()).unwrap();
        shipment.transition(ShipmentStatus::EnRuta, test_time()).unwrap();
        let before = shipment.clone();

        let err = shipment.amend(delivery(None), test_time()).unwrap_err();
        match err {
            DomainError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "EN_RUTA");
                assert_eq!(to, "EDITED");
            }
            _ => panic!("Expected InvalidTransition"),
        }
        assert_eq!(shipment, before);
    }

    #[test]
    fn terminal_shipments_refuse_everything() {
        for terminal in [ShipmentStatus::Entregado, ShipmentStatus::Cancelado] {
            assert!(terminal.is_terminal());
            for next in ShipmentStatus::ALL {
                assert!(!terminal.can_transition_to(*next));
            }
        }
    }

    #[test]
    fn wire_names_match() {
        assert_eq!(serde_json::to_string(&ShipmentStatus::EnRuta).unwrap(), "\"EN_RUTA\"");
        assert!("EN RUTA".parse::<ShipmentStatus>().is_err());
    }
}
