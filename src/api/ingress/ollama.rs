use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::api::common::{
    bool_field, client_session_id, json_response, ndjson_response, parse_json_object,
};
use crate::api::engine::{collect, dispatch, reasoning_for, stream_body, ModelChoice, ToolPlan, UpstreamCall};
use crate::error::{into_axum_response, GatewayError};
use crate::protocol::canonical::{IngressApi, InputItem};
use crate::protocol::ollama::{
    build_ollama_chat, convert_ollama_messages, normalize_ollama_tools, NdjsonEncoder,
};
use crate::state::AppState;
use crate::translate::{convert_chat_messages, convert_function_tools, relocate_system_message};
use crate::util::rfc3339_now;

const INGRESS: IngressApi = IngressApi::Ollama;

fn invalid_format() -> GatewayError {
    GatewayError::InvalidBody("Invalid request format".to_string())
}

/// Chat-shaped messages of an `/api/chat` body.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidBody`] unless `messages` is a non-empty list.
pub(crate) fn ollama_messages(payload: &Map<String, Value>) -> Result<Vec<Value>, GatewayError> {
    match payload.get("messages") {
        Some(Value::Array(messages)) if !messages.is_empty() => {
            let mut messages = convert_ollama_messages(messages, payload.get("images"));
            relocate_system_message(&mut messages);
            Ok(messages)
        }
        _ => Err(invalid_format()),
    }
}

pub async fn handler(state: Arc<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match handle(&state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => into_axum_response(&err, INGRESS),
    }
}

async fn handle(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, GatewayError> {
    let payload = parse_json_object(body, false)?;
    let messages = ollama_messages(&payload)?;
    let choice = ModelChoice::resolve(state, &payload);
    let model = choice.model.as_str();

    let tools_value = normalize_ollama_tools(payload.get("tools"));
    let tools = ToolPlan::from_payload(state, convert_function_tools(Some(&tools_value)), &payload)?;
    let input: Vec<InputItem> = convert_chat_messages(&messages)
        .into_iter()
        .map(InputItem::from)
        .collect();
    let reasoning = reasoning_for(state, &payload, choice.requested.as_deref());

    let envelope = dispatch(
        state,
        &UpstreamCall {
            model,
            instructions: state.instructions_for(model),
            input: &input,
            tools: &tools,
            reasoning: Some(reasoning),
            client_session_id: client_session_id(headers),
            extra_fields: &Map::new(),
        },
    )
    .await?;

    let created_at = rfc3339_now();
    let compat = state.config.reasoning.compat();
    if bool_field(&payload, "stream", true) {
        let encoder = NdjsonEncoder::new(choice.echo(), created_at);
        return Ok(ndjson_response(stream_body(state, envelope, Some(compat), encoder, model)));
    }

    let agg = collect(state, envelope, model).await?;
    Ok(json_response(&build_ollama_chat(&agg, choice.echo(), &created_at, compat)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_messages_must_be_non_empty_list() {
        for body in [json!({}), json!({"messages": []}), json!({"messages": "hi"})] {
            let err = ollama_messages(&object(body)).unwrap_err();
            assert_eq!(err.to_string(), "Invalid request format");
        }
    }

    #[test]
    fn test_top_level_images_attach_to_last_user_message() {
        let payload = object(json!({
            "messages": [{"role": "user", "content": "look"}],
            "images": ["iVBORw0KGgoAAAAA"]
        }));
        let messages = ollama_messages(&payload).unwrap();
        let items = convert_chat_messages(&messages);
        let value = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(value["content"][1]["image_url"], "data:image/png;base64,iVBORw0KGgoAAAAA");
    }
}
