//! Shipment workflow and its cascade into the sale and the vehicle.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use stockflow_core::{DomainError, SaleId, ShipmentId};
use stockflow_sales::{Sale, SaleStatus};
use stockflow_shipping::{Delivery, Shipment, ShipmentStatus, Vehicle};

use super::{Workflows, require, sales::restock};
use crate::error::WorkflowResult;
use crate::store::{Reference, Transaction};

/// A shipment after a transition, with the collaborators it changed.
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentUpdate {
    pub shipment: Shipment,
    pub sale: Option<Sale>,
    pub vehicle: Option<Vehicle>,
}

/// `NotFound` for any driver, route or vehicle the delivery names that does not exist.
async fn check_delivery_refs(tx: &mut dyn Transaction, delivery: &Delivery) -> WorkflowResult<()> {
    if let Some(driver_id) = delivery.driver_id {
        require(tx, Reference::Driver(driver_id)).await?;
    }
    if let Some(route_id) = delivery.route_id {
        require(tx, Reference::Route(route_id)).await?;
    }
    if let Some(vehicle_id) = delivery.vehicle_id {
        if tx.lock_vehicle(vehicle_id).await?.is_none() {
            return Err(DomainError::not_found("vehicle", vehicle_id).into());
        }
    }
    Ok(())
}

/// Validate the delivery references and insert a `PENDIENTE` shipment.
pub(super) async fn open_shipment(
    tx: &mut dyn Transaction,
    sale_id: Option<SaleId>,
    delivery: Delivery,
) -> WorkflowResult<Shipment> {
    check_delivery_refs(tx, &delivery).await?;

    let shipment = Shipment::open(sale_id, delivery, Utc::now())?;
    tx.insert_shipment(&shipment).await?;
    info!(shipment_id = %shipment.id, sale_id = ?sale_id, "shipment scheduled");
    Ok(shipment)
}

impl Workflows {
    /// Schedule a delivery, optionally for an existing sale.
    ///
    /// A sale that is not `PENDIENTE` is put back in `PENDIENTE`: fulfilment is
    /// in flight again once a shipment carries it.
    #[instrument(skip(self, delivery), err)]
    pub async fn create_shipment(
        &self,
        sale_id: Option<SaleId>,
        delivery: Delivery,
    ) -> WorkflowResult<Shipment> {
        let mut tx = self.begin().await?;

        if let Some(sale_id) = sale_id {
            let mut sale = tx
                .lock_sale(sale_id)
                .await?
                .ok_or_else(|| DomainError::not_found("sale", sale_id))?;
            if sale.reopen_for_delivery(Utc::now()) {
                tx.update_sale(&sale).await?;
                info!(sale_id = %sale_id, "sale reopened for delivery");
            }
        }

        let shipment = open_shipment(tx.as_mut(), sale_id, delivery).await?;
        tx.commit().await?;
        Ok(shipment)
    }

    /// Replace the delivery details of a shipment that is still `PENDIENTE`.
    ///
    /// Status, sale and delivered date are not editable here.
    #[instrument(skip(self, delivery), err)]
    pub async fn update_shipment(
        &self,
        id: ShipmentId,
        delivery: Delivery,
    ) -> WorkflowResult<Shipment> {
        let mut tx = self.begin().await?;
        let mut shipment = tx
            .lock_shipment(id)
            .await?
            .ok_or_else(|| DomainError::not_found("shipment", id))?;

        shipment.amend(delivery.clone(), Utc::now())?;
        check_delivery_refs(tx.as_mut(), &delivery).await?;

        tx.update_shipment(&shipment).await?;
        tx.commit().await?;

        info!(shipment_id = %id, "shipment details updated");
        Ok(shipment)
    }

    /// Move a shipment along its lifecycle and apply the cascade.
    ///
    /// `EN_RUTA` puts an attached vehicle on the road. `ENTREGADO` stamps the
    /// delivery date, completes the sale and frees the vehicle. `CANCELADO`
    /// voids the sale and frees the vehicle. The shipment, sale and vehicle
    /// change together or not at all.
    #[instrument(skip_all, fields(shipment_id = %id, next = %next), err)]
    pub async fn transition_shipment(
        &self,
        id: ShipmentId,
        next: ShipmentStatus,
    ) -> WorkflowResult<ShipmentUpdate> {
        let mut tx = self.begin().await?;
        let mut shipment = tx
            .lock_shipment(id)
            .await?
            .ok_or_else(|| DomainError::not_found("shipment", id))?;

        let now = Utc::now();
        let cascade = shipment.transition(next, now)?;

        let sale = match cascade.sale {
            Some((sale_id, target)) => {
                let mut sale = tx
                    .lock_sale(sale_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("sale", sale_id))?;
                if sale.status != target {
                    sale.transition(target, now)?;
                    if target == SaleStatus::Anulada && self.policy.restock_on_cancel {
                        restock(tx.as_mut(), &sale).await?;
                    }
                    tx.update_sale(&sale).await?;
                }
                Some(sale)
            }
            None => None,
        };

        let vehicle = match cascade.vehicle {
            Some((vehicle_id, status)) => {
                let mut vehicle = tx
                    .lock_vehicle(vehicle_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("vehicle", vehicle_id))?;
                if vehicle.set_status(status, now) {
                    tx.update_vehicle(&vehicle).await?;
                }
                Some(vehicle)
            }
            None => None,
        };

        tx.update_shipment(&shipment).await?;
        tx.commit().await?;

        info!(
            shipment_id = %id,
            status = %shipment.status,
            sale_status = ?sale.as_ref().map(|s| s.status),
            vehicle_status = ?vehicle.as_ref().map(|v| v.status),
            "shipment state changed"
        );
        Ok(ShipmentUpdate {
            shipment,
            sale,
            vehicle,
        })
    }

    pub async fn shipment(&self, id: ShipmentId) -> WorkflowResult<Shipment> {
        let mut tx = self.begin().await?;
        let shipment = tx
            .shipment(id)
            .await?
            .ok_or_else(|| DomainError::not_found("shipment", id))?;
        tx.rollback().await?;
        Ok(shipment)
    }

    /// All shipments, newest first.
    pub async fn shipments(&self) -> WorkflowResult<Vec<Shipment>> {
        let mut tx = self.begin().await?;
        let shipments = tx.shipments().await?;
        tx.rollback().await?;
        Ok(shipments)
    }
}
