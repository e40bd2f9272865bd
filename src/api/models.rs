use std::sync::Arc;

use axum::response::Response;
use bytes::Bytes;
use serde_json::json;

use crate::api::common::{json_bytes_response, json_response, parse_json_object, str_field};
use crate::error::{into_axum_response, GatewayError};
use crate::protocol::canonical::IngressApi;
use crate::state::{show_card, AppState};

/// `GET /v1/models`.
#[must_use]
pub fn openai_models(state: &AppState) -> Response {
    json_bytes_response(state.openai_models_body())
}

/// `GET /api/tags`.
#[must_use]
pub fn ollama_tags(state: &AppState) -> Response {
    json_bytes_response(state.ollama_tags_body())
}

/// `POST /api/show`.
pub async fn ollama_show(_state: Arc<AppState>, body: Bytes) -> Response {
    let card = parse_json_object(&body, false).and_then(|payload| {
        str_field(&payload, "model")
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(show_card)
            .ok_or_else(|| GatewayError::InvalidBody("Model not found".to_string()))
    });
    match card {
        Ok(card) => json_response(&card),
        Err(err) => into_axum_response(&err, IngressApi::Ollama),
    }
}

/// `GET /api/version`.
#[must_use]
pub fn ollama_version() -> Response {
    json_response(&json!({"version": env!("CARGO_PKG_VERSION")}))
}
