use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
};

use stockflow_core::SaleId;
use stockflow_sales::SaleStatus;

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale))
        .route("/:id/state", put(set_sale_state))
}

/// Debits stock immediately; a `delivery` object also schedules a shipment.
pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let req: dto::CreateSaleRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::CREATED,
        services.workflows.create_sale(req.sale, req.delivery).await,
    )
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.workflows.sales().await)
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SaleId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(StatusCode::OK, services.workflows.sale(id).await)
}

pub async fn set_sale_state(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let id: SaleId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let req: dto::StatusRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let next: SaleStatus = match dto::parse(&req.status) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(StatusCode::OK, services.workflows.set_sale_state(id, next).await)
}
