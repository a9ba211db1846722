use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use stockflow_core::{DomainError, SaleId, UserId};
use stockflow_infra::{InitialPlacement, ShelfUpdate};
use stockflow_products::{NewProduct, ProductEdit};
use stockflow_sales::NewSale;
use stockflow_shipping::Delivery;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    #[serde(flatten)]
    pub product: NewProduct,
    #[serde(default)]
    pub placement: Option<InitialPlacement>,
    #[serde(default)]
    pub actor_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(flatten)]
    pub edit: ProductEdit,
    /// Thresholds of the product's record in one warehouse.
    #[serde(default)]
    pub shelf: Option<ShelfUpdate>,
}

/// Target state for a purchase, sale, shipment or product.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    #[serde(flatten)]
    pub sale: NewSale,
    #[serde(default)]
    pub delivery: Option<Delivery>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    #[serde(default)]
    pub sale_id: Option<SaleId>,
    #[serde(flatten)]
    pub delivery: Delivery,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
    pub reason: String,
    #[serde(default)]
    pub actor_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct CountStockRequest {
    pub counted: i64,
    #[serde(default)]
    pub actor_id: Option<UserId>,
}

// -------------------------
// Parsing helpers
// -------------------------

/// Decode a JSON body, turning shape errors into a 400 `validation_error`.
pub fn parse_body<T: DeserializeOwned>(
    body: serde_json::Value,
) -> Result<T, axum::response::Response> {
    serde_json::from_value(body).map_err(|e| {
        errors::domain_error_to_response(DomainError::validation(format!("invalid body: {e}")))
    })
}

/// Parse an id or closed-enum value with its strict `FromStr`.
pub fn parse<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(errors::domain_error_to_response)
}
