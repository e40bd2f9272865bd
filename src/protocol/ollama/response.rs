use serde_json::{Map, Value};

use crate::policy::reasoning::{reasoning_view, ReasoningView};
use crate::protocol::canonical::CompatibilityMode;
use crate::stream::Aggregate;

use super::stream::{done_object, ollama_tool_call};

/// Build the single non-streamed `/api/chat` object.
#[must_use]
pub fn build_ollama_chat(
    agg: &Aggregate,
    model: &str,
    created_at: &str,
    compat: CompatibilityMode,
) -> Value {
    let mut message = Map::new();
    let view = reasoning_view(&agg.reasoning_summary, &agg.reasoning_full, compat);
    let content = view.wrap_content(&agg.text).unwrap_or_else(|| agg.text.clone());
    message.insert("content".into(), Value::String(content));

    let thinking = match view {
        ReasoningView::Structured(text) => Some(text),
        ReasoningView::Flat { summary, full } => {
            let joined: Vec<String> = summary.into_iter().chain(full).collect();
            Some(joined.join("\n\n"))
        }
        ReasoningView::Hidden | ReasoningView::ThinkTags(_) => None,
    };
    if let Some(thinking) = thinking {
        message.insert("thinking".into(), Value::String(thinking));
    }

    if !agg.tool_calls.is_empty() {
        let calls = agg
            .tool_calls
            .iter()
            .map(|call| ollama_tool_call(&call.name, &call.arguments))
            .collect();
        message.insert("tool_calls".into(), Value::Array(calls));
    }

    done_object(model, created_at, agg.usage.as_ref(), message)
}
