use std::convert::Infallible;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use futures_util::{future, Stream, StreamExt};
use serde_json::{json, Map, Value};

use crate::api::common::{
    bool_field, client_session_id, json_response, parse_json_object, sse_response, str_field,
};
use crate::api::engine::{collect, dispatch, reasoning_for, ModelChoice, ToolPlan, UpstreamCall};
use crate::error::{into_axum_response, GatewayError};
use crate::protocol::canonical::{IngressApi, InputItem};
use crate::state::AppState;
use crate::stream::Aggregate;
use crate::transport::BodyStream;
use crate::translate::{convert_chat_messages, convert_responses_tools, relocate_system_message};
use crate::util::{random_hex_id, unix_now_secs};

const INGRESS: IngressApi = IngressApi::OpenAiResponses;

/// Top-level fields forwarded to the upstream as given.
const PASSTHROUGH_KEYS: [&str; 9] = [
    "temperature",
    "top_p",
    "seed",
    "stop",
    "text",
    "metadata",
    "include",
    "top_logprobs",
    "truncation",
];

/// Fields that may carry an upstream `rs_*` reference.
const REFERENCE_KEYS: [&str; 4] = ["previous_response_id", "response_id", "reference_id", "item_id"];

const CONTENT_PART_TYPES: [&str; 3] = ["input_text", "input_image", "output_text"];

fn is_content_part(value: &Value) -> bool {
    value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|kind| CONTENT_PART_TYPES.contains(&kind))
}

/// Drop `"type":"message"`, which the upstream refuses on input items.
fn without_message_type(mut item: Map<String, Value>) -> Map<String, Value> {
    if item.get("type").and_then(Value::as_str) == Some("message") {
        item.remove("type");
    }
    item
}

fn user_message(content: Value) -> Value {
    json!({"role": "user", "content": content})
}

fn items_from_input(input: &Value) -> Option<Vec<Value>> {
    match input {
        Value::String(text) => Some(vec![user_message(json!([{"type": "input_text", "text": text}]))]),
        Value::Array(entries) if !entries.is_empty() && entries.iter().all(is_content_part) => {
            Some(vec![user_message(input.clone())])
        }
        Value::Array(entries) => Some(
            entries
                .iter()
                .filter_map(Value::as_object)
                .map(|item| Value::Object(without_message_type(item.clone())))
                .collect(),
        ),
        Value::Object(item) => {
            let item = without_message_type(item.clone());
            match (item.get("role"), item.get("content")) {
                (Some(Value::String(_)), Some(Value::Array(_))) => Some(vec![Value::Object(item)]),
                (_, Some(content @ Value::Array(_))) => Some(vec![user_message(content.clone())]),
                _ => None,
            }
        }
        _ => None,
    }
}

fn items_from_messages(payload: &Map<String, Value>) -> Option<Vec<Value>> {
    let mut messages = match payload.get("messages") {
        Some(Value::Array(messages)) => messages.clone(),
        None | Some(Value::Null) => {
            vec![json!({"role": "user", "content": str_field(payload, "prompt")?})]
        }
        Some(_) => return None,
    };
    relocate_system_message(&mut messages);
    convert_chat_messages(&messages)
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()
        .ok()
}

fn is_upstream_reference(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| s.starts_with("rs_"))
}

fn holds_reference(value: &Value, key: Option<&str>) -> bool {
    match value {
        Value::String(s) => {
            key.is_some_and(|key| REFERENCE_KEYS.contains(&key.to_ascii_lowercase().as_str()))
                && s.trim().starts_with("rs_")
        }
        Value::Object(map) => map.iter().any(|(k, v)| holds_reference(v, Some(k))),
        Value::Array(values) => values.iter().any(|v| holds_reference(v, key)),
        _ => false,
    }
}

/// Strip upstream `rs_*` reference fields from items and their content parts.
pub(crate) fn strip_upstream_references(items: &mut [Value]) {
    for item in items.iter_mut().filter_map(Value::as_object_mut) {
        for key in REFERENCE_KEYS {
            if is_upstream_reference(item.get(key)) {
                item.remove(key);
            }
        }
        let Some(Value::Array(parts)) = item.get_mut("content") else {
            continue;
        };
        for part in parts.iter_mut() {
            if !holds_reference(part, None) {
                continue;
            }
            if let Some(part) = part.as_object_mut() {
                for key in REFERENCE_KEYS {
                    part.remove(key);
                }
            }
        }
    }
}

/// Input items of a `/v1/responses` body, before thread and instruction
/// prefixes.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidBody`] when no usable input is present.
pub(crate) fn responses_input(payload: &Map<String, Value>) -> Result<Vec<Value>, GatewayError> {
    let items = payload
        .get("input")
        .and_then(items_from_input)
        .or_else(|| items_from_messages(payload))
        .filter(|items| !items.is_empty());
    let Some(mut items) = items else {
        return Err(GatewayError::InvalidBody(
            "Request must include non-empty 'input' (or 'messages'/'prompt')".to_string(),
        ));
    };
    strip_upstream_references(&mut items);
    Ok(items)
}

fn passthrough_fields(payload: &Map<String, Value>) -> Map<String, Value> {
    PASSTHROUGH_KEYS
        .iter()
        .filter_map(|key| match payload.get(*key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(((*key).to_string(), value.clone())),
        })
        .collect()
}

/// Relay the upstream SSE bytes as they arrive; a broken upstream ends the
/// client stream.
fn relay(body: BodyStream) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    body.scan((), |_, chunk| {
        future::ready(match chunk {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(error = %err, "upstream stream broke mid-response");
                None
            }
        })
    })
    .map(Ok)
}

fn response_output(agg: Aggregate) -> Vec<Value> {
    if !agg.output_items.is_empty() {
        return agg.output_items;
    }
    if let Some(Value::Array(output)) = agg.completed_output {
        if !output.is_empty() {
            return output;
        }
    }
    if agg.text.is_empty() {
        return Vec::new();
    }
    vec![json!({
        "type": "message",
        "role": "assistant",
        "content": [{"type": "output_text", "text": agg.text}],
    })]
}

/// Non-streamed `response` object. Usage keeps the Responses field names.
pub(crate) fn build_response_object(id: &str, model: &str, created_at: u64, agg: Aggregate) -> Value {
    let usage = agg.usage;
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(id.to_string()));
    obj.insert("object".into(), Value::String("response".into()));
    obj.insert("created_at".into(), Value::from(created_at));
    obj.insert("model".into(), Value::String(model.to_string()));
    obj.insert("output".into(), Value::Array(response_output(agg)));
    obj.insert("status".into(), Value::String("completed".into()));
    if let Some(usage) = usage {
        obj.insert(
            "usage".into(),
            json!({
                "input_tokens": usage.prompt_tokens,
                "output_tokens": usage.completion_tokens,
                "total_tokens": usage.total_tokens,
            }),
        );
    }
    Value::Object(obj)
}

pub async fn handler(state: Arc<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match handle(&state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => into_axum_response(&err, INGRESS),
    }
}

/// `GET /v1/responses/{id}`.
pub async fn retrieve(state: Arc<AppState>, id: &str) -> Response {
    match state.stored_response(id) {
        Some(stored) => json_response(&stored),
        None => into_axum_response(
            &GatewayError::NotFound(format!("Response '{id}' not found")),
            INGRESS,
        ),
    }
}

async fn handle(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, GatewayError> {
    let payload = parse_json_object(body, false)?;
    let choice = ModelChoice::resolve(state, &payload);
    let model = choice.model.as_str();

    let mut items = responses_input(&payload)?;
    if let Some(previous) = str_field(&payload, "previous_response_id").map(str::trim) {
        if let Some(mut thread) = state.thread(previous).filter(|t| !t.is_empty()) {
            tracing::debug!(previous, items = thread.len(), "prepending stored thread");
            thread.append(&mut items);
            items = thread;
        }
    }
    if let Some(user_instructions) = str_field(&payload, "instructions").filter(|s| !s.trim().is_empty()) {
        items.insert(
            0,
            user_message(json!([{"type": "input_text", "text": user_instructions}])),
        );
    }

    let tools = ToolPlan::from_payload(state, convert_responses_tools(payload.get("tools"))?, &payload)?;
    let reasoning = reasoning_for(state, &payload, choice.requested.as_deref());
    let extra_fields = passthrough_fields(&payload);
    let input: Vec<InputItem> = items.iter().cloned().map(InputItem::Raw).collect();

    let envelope = dispatch(
        state,
        &UpstreamCall {
            model,
            instructions: state.instructions_for(model),
            input: &input,
            tools: &tools,
            reasoning: Some(reasoning),
            client_session_id: client_session_id(headers),
            extra_fields: &extra_fields,
        },
    )
    .await?;

    if bool_field(&payload, "stream", true) {
        return Ok(sse_response(relay(envelope.body)));
    }

    let agg = collect(state, envelope, model).await?;
    let id = random_hex_id("resp_");
    let response = build_response_object(&id, model, unix_now_secs(), agg);
    if bool_field(&payload, "store", false) {
        let mut thread = items;
        if let Some(Value::Array(output)) = response.get("output") {
            thread.extend(output.iter().filter(|item| item.is_object()).cloned());
        }
        state.store_response(&id, response.clone(), thread);
    }
    Ok(json_response(&response))
}
