//! Non-streaming consumer: folds the upstream event stream into one result.

use serde_json::Value;

use crate::protocol::canonical::CanonicalUsage;
use crate::protocol::responses::{serialize_tool_args, ParsedEvent, UpstreamEvent};

use super::sse::UpstreamLines;

/// A finalized function call collected from `response.output_item.done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Everything a one-shot response is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub text: String,
    pub reasoning_summary: String,
    pub reasoning_full: String,
    pub tool_calls: Vec<AggregatedToolCall>,
    /// First upstream response id observed.
    pub response_id: Option<String>,
    pub usage: Option<CanonicalUsage>,
    /// Raw `output_item.done` items in arrival order.
    pub output_items: Vec<Value>,
    /// `response.output` of the completion event, if any.
    pub completed_output: Option<Value>,
    pub failure: Option<String>,
}

impl Aggregate {
    /// Apply one event. Returns `false` once the result is final.
    pub fn apply(&mut self, parsed: ParsedEvent) -> bool {
        if self.response_id.is_none() {
            self.response_id = parsed.response_id;
        }
        if parsed.usage.is_some() {
            self.usage = parsed.usage;
        }
        match parsed.event {
            UpstreamEvent::OutputTextDelta(delta) => self.text.push_str(&delta),
            UpstreamEvent::ReasoningSummaryDelta(delta) => self.reasoning_summary.push_str(&delta),
            UpstreamEvent::ReasoningTextDelta(delta) => self.reasoning_full.push_str(&delta),
            UpstreamEvent::OutputItemDone(item) => {
                if let Some(call) = function_call_from_item(&item) {
                    self.tool_calls.push(call);
                }
                self.output_items.push(item);
            }
            UpstreamEvent::Failed(message) => {
                self.failure = Some(message);
                return false;
            }
            UpstreamEvent::Completed(response) => {
                self.completed_output = response.and_then(|mut r| r.get_mut("output").map(Value::take));
                return false;
            }
            UpstreamEvent::Done => return false,
            UpstreamEvent::OutputTextDone
            | UpstreamEvent::ReasoningSummaryPartAdded
            | UpstreamEvent::WebSearch(_)
            | UpstreamEvent::Ignored => {}
        }
        true
    }
}

fn function_call_from_item(item: &Value) -> Option<AggregatedToolCall> {
    if item.get("type").and_then(Value::as_str) != Some("function_call") {
        return None;
    }
    let non_empty_str = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    let id = non_empty_str("call_id")
        .or_else(|| non_empty_str("id"))
        .unwrap_or_default()
        .to_string();
    let name = non_empty_str("name").unwrap_or_default().to_string();
    let arguments = match item.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Object(_) | Value::Array(_))) => serialize_tool_args(v),
        _ => String::new(),
    };
    Some(AggregatedToolCall {
        id,
        name,
        arguments,
    })
}

/// Read the upstream body to its terminal event and fold it.
///
/// The body is dropped (closing the upstream) before returning on every path.
pub async fn aggregate(mut lines: UpstreamLines) -> Aggregate {
    let mut agg = Aggregate::default();
    while let Some(line) = lines.next_data().await {
        match line {
            Ok(data) => {
                if !agg.apply(ParsedEvent::from_data(&data)) {
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "upstream body ended with an error");
                break;
            }
        }
    }
    drop(lines);
    agg
}
