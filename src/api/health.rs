use axum::response::Response;
use serde_json::json;

use crate::api::common::json_response;

/// `GET /` and `GET /health`.
#[must_use]
pub fn handler() -> Response {
    json_response(&json!({"status": "ok"}))
}
