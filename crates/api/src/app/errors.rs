use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockflow_core::DomainError;
use stockflow_infra::{StoreError, WorkflowError};

pub fn workflow_error_to_response(err: WorkflowError) -> axum::response::Response {
    match err {
        WorkflowError::Domain(err) => domain_error_to_response(err),
        WorkflowError::Store(err) => store_error_to_response(err),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::NotFound { entity, id } => json_error_with(
            StatusCode::NOT_FOUND,
            "not_found",
            message,
            json!({ "entity": entity, "id": id }),
        ),
        DomainError::InsufficientStock {
            product_id,
            warehouse_id,
            available,
            requested,
        } => json_error_with(
            StatusCode::CONFLICT,
            "insufficient_stock",
            message,
            json!({
                "product_id": product_id,
                "warehouse_id": warehouse_id,
                "available": available,
                "requested": requested,
                "shortfall": requested.saturating_sub(available),
            }),
        ),
        DomainError::InvalidTransition { entity, id, from, to } => json_error_with(
            StatusCode::CONFLICT,
            "invalid_transition",
            message,
            json!({ "entity": entity, "id": id, "from": from, "to": to }),
        ),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::InvariantViolation(_) => {
            tracing::error!(error = %message, "domain invariant violated");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation", message)
        }
    }
}

fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::LockTimeout(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "lock_timeout", msg)
        }
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        other => {
            tracing::error!(error = %other, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", other.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_error_with(status, code, message, json!({}))
}

/// Error body with extra context fields merged next to `error` and `message`.
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    context: serde_json::Value,
) -> axum::response::Response {
    let mut body = json!({
        "error": code,
        "message": message.into(),
    });
    if let (Some(body), serde_json::Value::Object(extra)) = (body.as_object_mut(), context) {
        body.extend(extra);
    }
    (status, axum::Json(body)).into_response()
}
