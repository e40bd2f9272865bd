use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use serde_json::{json, Map, Value};

use crate::api::common::{
    bool_field, client_session_id, include_usage, json_response, parse_json_object, sse_response,
    str_field,
};
use crate::api::engine::{
    collect, dispatch, reasoning_for, stream_body, ModelChoice, ToolPlan, UpstreamCall,
};
use crate::error::{into_axum_response, GatewayError};
use crate::protocol::canonical::{CanonicalItem, IngressApi, InputItem, ReasoningParam};
use crate::protocol::openai_chat::{build_chat_completion, ChatChunkEncoder};
use crate::state::AppState;
use crate::translate::{convert_chat_messages, convert_function_tools, relocate_system_message};
use crate::util::unix_now_secs;

const INGRESS: IngressApi = IngressApi::OpenAiChat;

/// A `/v1/chat/completions` request reduced to what the upstream needs.
#[derive(Debug)]
pub(crate) struct ChatRequest {
    pub(crate) model: ModelChoice,
    pub(crate) input: Vec<InputItem>,
    pub(crate) tools: ToolPlan,
    pub(crate) reasoning: ReasoningParam,
    pub(crate) stream: bool,
    pub(crate) include_usage: bool,
}

/// Message list of a chat request: `messages`, else a string `prompt` or
/// `input` as one user message.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidBody`] when `messages` is present but not a list.
pub(crate) fn chat_messages(payload: &Map<String, Value>) -> Result<Vec<Value>, GatewayError> {
    match payload.get("messages") {
        Some(Value::Array(messages)) => Ok(messages.clone()),
        None | Some(Value::Null) => {
            let fallback = str_field(payload, "prompt").or_else(|| str_field(payload, "input"));
            Ok(fallback
                .map(|text| vec![json!({"role": "user", "content": text})])
                .unwrap_or_default())
        }
        Some(_) => Err(GatewayError::InvalidBody(
            "Request must include messages: []".to_string(),
        )),
    }
}

/// # Errors
///
/// Returns body validation and tool policy rejections.
pub(crate) fn parse_chat_request(
    state: &AppState,
    payload: &Map<String, Value>,
) -> Result<ChatRequest, GatewayError> {
    let model = ModelChoice::resolve(state, payload);
    let mut messages = chat_messages(payload)?;
    relocate_system_message(&mut messages);

    let tools = ToolPlan::from_payload(state, convert_function_tools(payload.get("tools")), payload)?;

    let mut items = convert_chat_messages(&messages);
    if items.is_empty() {
        if let Some(prompt) = str_field(payload, "prompt").filter(|p| !p.trim().is_empty()) {
            items.push(CanonicalItem::user_text(prompt));
        }
    }

    let reasoning = reasoning_for(state, payload, model.requested.as_deref());
    Ok(ChatRequest {
        model,
        input: items.into_iter().map(InputItem::from).collect(),
        tools,
        reasoning,
        stream: bool_field(payload, "stream", false),
        include_usage: include_usage(payload),
    })
}

pub async fn handler(state: Arc<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match handle(&state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => into_axum_response(&err, INGRESS),
    }
}

async fn handle(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, GatewayError> {
    let payload = parse_json_object(body, true)?;
    let request = parse_chat_request(state, &payload)?;
    let model = request.model.model.as_str();

    let envelope = dispatch(
        state,
        &UpstreamCall {
            model,
            instructions: state.instructions_for(model),
            input: &request.input,
            tools: &request.tools,
            reasoning: Some(request.reasoning),
            client_session_id: client_session_id(headers),
            extra_fields: &Map::new(),
        },
    )
    .await?;

    let created = unix_now_secs();
    let compat = state.config.reasoning.compat();
    if request.stream {
        let encoder = ChatChunkEncoder::new(request.model.echo(), created, request.include_usage);
        let body = stream_body(state, envelope, Some(compat), encoder, model);
        return Ok(sse_response(body));
    }

    let agg = collect(state, envelope, model).await?;
    Ok(json_response(&build_chat_completion(
        &agg,
        request.model.echo(),
        compat,
        created,
    )))
}
