use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
};

use stockflow_core::ShipmentId;
use stockflow_shipping::{Delivery, ShipmentStatus};

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_shipment).get(list_shipments))
        .route("/:id", get(get_shipment).put(update_shipment))
        .route("/:id/state", put(transition_shipment))
}

pub async fn create_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let req: dto::CreateShipmentRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::CREATED,
        services
            .workflows
            .create_shipment(req.sale_id, req.delivery)
            .await,
    )
}

pub async fn list_shipments(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.workflows.shipments().await)
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ShipmentId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(StatusCode::OK, services.workflows.shipment(id).await)
}

/// Edit delivery details while the shipment is still `PENDIENTE`.
pub async fn update_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let id: ShipmentId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let delivery: Delivery = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::OK,
        services.workflows.update_shipment(id, delivery).await,
    )
}

/// Returns the shipment plus the sale and vehicle the transition touched.
pub async fn transition_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let id: ShipmentId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let req: dto::StatusRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let next: ShipmentStatus = match dto::parse(&req.status) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::OK,
        services.workflows.transition_shipment(id, next).await,
    )
}
