use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
};

use stockflow_core::ProductId;
use stockflow_products::{CatalogEntry, ProductStatus};

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product).get(list_products_for_sale))
        .route("/:id", get(get_product).put(update_product))
        .route("/:id/status", put(set_product_status))
        .route("/:id/movements", get(product_movements))
}

pub fn catalog_router() -> Router {
    Router::new().route("/products", post(register_catalog_product))
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let req: dto::RegisterProductRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::CREATED,
        services
            .workflows
            .register_product(req.product, req.placement, req.actor_id)
            .await,
    )
}

pub async fn register_catalog_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let entry: CatalogEntry = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::CREATED,
        services.workflows.register_catalog_product(entry).await,
    )
}

pub async fn list_products_for_sale(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.workflows.products_for_sale().await)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(StatusCode::OK, services.workflows.product(id).await)
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let id: ProductId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let req: dto::UpdateProductRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::OK,
        services.workflows.update_product(id, req.edit, req.shelf).await,
    )
}

pub async fn set_product_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let id: ProductId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let req: dto::StatusRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let status: ProductStatus = match dto::parse(&req.status) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::OK,
        services.workflows.set_product_status(id, status).await,
    )
}

/// Movement history of a product across warehouses, newest first.
pub async fn product_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match dto::parse(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(StatusCode::OK, services.workflows.history(id).await)
}
