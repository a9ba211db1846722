use axum::Router;

pub mod common;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod shipments;
pub mod stock;
pub mod system;

/// Router for all workflow endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/catalog", products::catalog_router())
        .nest("/warehouses", stock::router())
        .nest("/purchases", purchases::router())
        .nest("/sales", sales::router())
        .nest("/shipments", shipments::router())
}
