use serde_json::{json, Map, Value};

use crate::policy::reasoning::{reasoning_view, ReasoningView};
use crate::protocol::canonical::CompatibilityMode;
use crate::stream::Aggregate;

use super::{OpenAiChatResponse, OpenAiChoice, OpenAiToolCall, OpenAiToolCallFunction};

const DEFAULT_RESPONSE_ID: &str = "chatcmpl";

/// Attach aggregated reasoning to an assistant message per `view`.
pub(crate) fn apply_reasoning_to_message(message: &mut Map<String, Value>, view: &ReasoningView) {
    match view {
        ReasoningView::Hidden => {}
        ReasoningView::ThinkTags(_) => {
            let content = message
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if let Some(wrapped) = view.wrap_content(content) {
                message.insert("content".into(), Value::String(wrapped));
            }
        }
        ReasoningView::Structured(text) => {
            message.insert(
                "reasoning".into(),
                json!({"content": [{"type": "text", "text": text}]}),
            );
        }
        ReasoningView::Flat { summary, full } => {
            if let Some(summary) = summary {
                message.insert("reasoning_summary".into(), Value::String(summary.clone()));
            }
            if let Some(full) = full {
                message.insert("reasoning".into(), Value::String(full.clone()));
            }
        }
    }
}

/// Build the one-shot `chat.completion` object from a drained upstream stream.
#[must_use]
pub fn build_chat_completion(
    agg: &Aggregate,
    model: &str,
    compat: CompatibilityMode,
    created: u64,
) -> OpenAiChatResponse {
    let mut message = Map::new();
    message.insert("role".into(), Value::String("assistant".into()));
    let content = if agg.text.is_empty() {
        Value::Null
    } else {
        Value::String(agg.text.clone())
    };
    message.insert("content".into(), content);

    if !agg.tool_calls.is_empty() {
        let calls: Vec<OpenAiToolCall> = agg
            .tool_calls
            .iter()
            .map(|call| OpenAiToolCall {
                id: call.id.clone(),
                type_: "function",
                function: OpenAiToolCallFunction {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect();
        message.insert(
            "tool_calls".into(),
            serde_json::to_value(calls).unwrap_or(Value::Null),
        );
    }

    let view = reasoning_view(&agg.reasoning_summary, &agg.reasoning_full, compat);
    apply_reasoning_to_message(&mut message, &view);

    let finish_reason = if agg.tool_calls.is_empty() {
        "stop"
    } else {
        "tool_calls"
    };

    OpenAiChatResponse {
        id: agg
            .response_id
            .clone()
            .unwrap_or_else(|| DEFAULT_RESPONSE_ID.to_string()),
        object: "chat.completion",
        created,
        model: model.to_string(),
        choices: vec![OpenAiChoice {
            index: 0,
            message,
            finish_reason,
        }],
        usage: agg.usage,
    }
}
