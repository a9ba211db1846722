//! Stock ledger endpoints, scoped by warehouse.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::json;

use stockflow_core::{ProductId, WarehouseId};
use stockflow_inventory::{StockKey, StockThresholds};

use crate::app::dto;
use crate::app::routes::common::respond;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:warehouse_id/stock/:product_id", get(get_stock_level))
        .route("/:warehouse_id/stock/:product_id/adjustments", post(adjust_stock))
        .route("/:warehouse_id/stock/:product_id/counts", post(count_stock))
        .route(
            "/:warehouse_id/stock/:product_id/thresholds",
            axum::routing::put(update_thresholds),
        )
        .route("/:warehouse_id/stock/:product_id/reconciliation", get(reconcile))
        .route("/:warehouse_id/low-stock", get(low_stock))
        .route("/:warehouse_id/received-goods", get(received_goods))
}

fn stock_key(warehouse_id: &str, product_id: &str) -> Result<StockKey, axum::response::Response> {
    let warehouse_id: WarehouseId = dto::parse(warehouse_id)?;
    let product_id: ProductId = dto::parse(product_id)?;
    Ok(StockKey::new(product_id, warehouse_id))
}

pub async fn get_stock_level(
    Extension(services): Extension<Arc<AppServices>>,
    Path((warehouse_id, product_id)): Path<(String, String)>,
) -> axum::response::Response {
    let key = match stock_key(&warehouse_id, &product_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let result = services
        .workflows
        .stock_level(key.product_id, key.warehouse_id)
        .await
        .map(|record| {
            json!({
                "product_id": record.product_id(),
                "warehouse_id": record.warehouse_id(),
                "quantity": record.quantity(),
                "thresholds": record.thresholds(),
                "below_minimum": record.is_below_minimum(),
                "updated_at": record.updated_at(),
            })
        });
    respond(StatusCode::OK, result)
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path((warehouse_id, product_id)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let key = match stock_key(&warehouse_id, &product_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let req: dto::AdjustStockRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::CREATED,
        services
            .workflows
            .adjust_stock(key, req.delta, req.reason, req.actor_id)
            .await,
    )
}

pub async fn count_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path((warehouse_id, product_id)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let key = match stock_key(&warehouse_id, &product_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let req: dto::CountStockRequest = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let result = services
        .workflows
        .count_stock(key, req.counted, req.actor_id)
        .await
        .map(|movement| json!({ "movement": movement }));
    respond(StatusCode::OK, result)
}

pub async fn update_thresholds(
    Extension(services): Extension<Arc<AppServices>>,
    Path((warehouse_id, product_id)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let key = match stock_key(&warehouse_id, &product_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let thresholds: StockThresholds = match dto::parse_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::OK,
        services.workflows.update_thresholds(key, thresholds).await,
    )
}

pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Path((warehouse_id, product_id)): Path<(String, String)>,
) -> axum::response::Response {
    let key = match stock_key(&warehouse_id, &product_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let result = services.workflows.reconcile(key).await.map(|report| {
        json!({
            "consistent": report.is_consistent(),
            "report": report,
        })
    });
    respond(StatusCode::OK, result)
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(warehouse_id): Path<String>,
) -> axum::response::Response {
    let warehouse_id: WarehouseId = match dto::parse(&warehouse_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(StatusCode::OK, services.workflows.low_stock(warehouse_id).await)
}

pub async fn received_goods(
    Extension(services): Extension<Arc<AppServices>>,
    Path(warehouse_id): Path<String>,
) -> axum::response::Response {
    let warehouse_id: WarehouseId = match dto::parse(&warehouse_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    respond(
        StatusCode::OK,
        services.workflows.received_by_warehouse(warehouse_id).await,
    )
}
