use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::api::common::{
    bool_field, client_session_id, include_usage, json_response, parse_json_object, sse_response,
};
use crate::api::engine::{collect, dispatch, reasoning_for, stream_body, ModelChoice, ToolPlan, UpstreamCall};
use crate::error::{into_axum_response, GatewayError};
use crate::protocol::canonical::{CanonicalItem, IngressApi, InputItem};
use crate::protocol::openai_completions::{build_text_completion, TextChunkEncoder};
use crate::state::AppState;
use crate::util::unix_now_secs;

const INGRESS: IngressApi = IngressApi::OpenAiCompletions;

/// Prompt text of a legacy completion: a string, a list of strings joined
/// together, else the `suffix`.
pub(crate) fn prompt_text(payload: &Map<String, Value>) -> String {
    match payload.get("prompt") {
        Some(Value::String(prompt)) => prompt.clone(),
        Some(Value::Array(parts)) => parts.iter().filter_map(Value::as_str).collect(),
        _ => payload
            .get("suffix")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

pub async fn handler(state: Arc<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match handle(&state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => into_axum_response(&err, INGRESS),
    }
}

async fn handle(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, GatewayError> {
    let payload = parse_json_object(body, true)?;
    let choice = ModelChoice::resolve(state, &payload);
    let model = choice.model.as_str();
    let input = [InputItem::from(CanonicalItem::user_text(prompt_text(&payload)))];
    let reasoning = reasoning_for(state, &payload, choice.requested.as_deref());
    let tools = ToolPlan::default();

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

    let created = unix_now_secs();
    if bool_field(&payload, "stream", false) {
        let encoder = TextChunkEncoder::new(choice.echo(), created, include_usage(&payload));
        return Ok(sse_response(stream_body(state, envelope, None, encoder, model)));
    }

    let agg = collect(state, envelope, model).await?;
    Ok(json_response(&build_text_completion(&agg, choice.echo(), created)))
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
    fn test_prompt_shapes() {
        assert_eq!(prompt_text(&object(json!({"prompt": "abc"}))), "abc");
        assert_eq!(prompt_text(&object(json!({"prompt": ["a", 1, "b"]}))), "ab");
        assert_eq!(prompt_text(&object(json!({"prompt": 3, "suffix": "tail"}))), "tail");
        assert_eq!(prompt_text(&object(json!({}))), "");
    }
}
