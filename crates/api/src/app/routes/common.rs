use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use stockflow_infra::WorkflowResult;

use crate::app::errors;

/// Serialize a workflow result, or map its error to the JSON error body.
pub fn respond<T: Serialize>(status: StatusCode, result: WorkflowResult<T>) -> axum::response::Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
