use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
};

use stockflow_core::PurchaseId;
use stockflow_purchasing::{NewPurchase, PurchaseStatus};

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase).get(list_purchases))
        .route("/:id", get(get_purchase))
        .route("/:id/state", put(set_purchase_state))
}

pub async fn create_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let draft: NewPurchase = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::CREATED,
        services.workflows.create_purchase(draft).await,
    )
}

pub async fn list_purchases(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.workflows.purchases().await)
}

pub async fn get_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PurchaseId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(StatusCode::OK, services.workflows.purchase(id).await)
}

/// `COMPLETADA` receives the goods into stock; `ANULADA` voids the purchase.
pub async fn set_purchase_state(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let id: PurchaseId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let req: dto::StatusRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let next: PurchaseStatus = match dto::parse(&req.status) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::OK,
        services.workflows.set_purchase_state(id, next).await,
    )
}
