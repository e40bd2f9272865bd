use serde_json::{Map, Value};

use crate::protocol::canonical::CanonicalUsage;

/// A built-in web search progress record (`*web_search_call*` kinds).
#[derive(Debug, Clone, PartialEq)]
pub struct WebSearchEvent {
    pub call_id: String,
    pub item: Map<String, Value>,
    pub event: Map<String, Value>,
    pub finished: bool,
}

/// Closed set of upstream SSE event kinds the translators act on.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    OutputTextDelta(String),
    OutputTextDone,
    ReasoningSummaryPartAdded,
    ReasoningSummaryDelta(String),
    ReasoningTextDelta(String),
    WebSearch(WebSearchEvent),
    OutputItemDone(Value),
    Failed(String),
    /// `response.completed`, carrying the final response object if any.
    Completed(Option<Value>),
    /// Literal `[DONE]` data line.
    Done,
    Ignored,
}

/// One decoded `data:` payload together with the fields every event kind
/// may carry on its `response` object.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub kind: Option<String>,
    pub event: UpstreamEvent,
    pub response_id: Option<String>,
    pub usage: Option<CanonicalUsage>,
}

impl ParsedEvent {
    fn bare(event: UpstreamEvent) -> Self {
        Self {
            kind: None,
            event,
            response_id: None,
            usage: None,
        }
    }

    /// Decode the payload of a `data:` line. Blank, malformed and non-object
    /// payloads decode to [`UpstreamEvent::Ignored`].
    #[must_use]
    pub fn from_data(data: &str) -> Self {
        let data = data.trim();
        if data.is_empty() {
            return Self::bare(UpstreamEvent::Ignored);
        }
        if data == "[DONE]" {
            return Self::bare(UpstreamEvent::Done);
        }
        let Ok(Value::Object(mut evt)) = serde_json::from_str::<Value>(data) else {
            return Self::bare(UpstreamEvent::Ignored);
        };

        let response = evt.get("response").and_then(Value::as_object);
        let response_id = response
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let usage = response
            .and_then(|r| r.get("usage"))
            .and_then(CanonicalUsage::from_upstream);
        let kind = evt
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);

        let event = match kind.as_deref() {
            Some(k) if k.contains("web_search_call") => {
                UpstreamEvent::WebSearch(web_search_event(k, &mut evt))
            }
            Some("response.output_text.delta") => UpstreamEvent::OutputTextDelta(take_delta(&mut evt)),
            Some("response.output_text.done") => UpstreamEvent::OutputTextDone,
            Some("response.reasoning_summary_part.added") => {
                UpstreamEvent::ReasoningSummaryPartAdded
            }
            Some("response.reasoning_summary_text.delta") => {
                UpstreamEvent::ReasoningSummaryDelta(take_delta(&mut evt))
            }
            Some("response.reasoning_text.delta") => {
                UpstreamEvent::ReasoningTextDelta(take_delta(&mut evt))
            }
            Some("response.output_item.done") => UpstreamEvent::OutputItemDone(
                evt.remove("item")
                    .filter(Value::is_object)
                    .unwrap_or_else(|| Value::Object(Map::new())),
            ),
            Some("response.failed") => UpstreamEvent::Failed(failure_message(&evt)),
            Some("response.completed") => {
                UpstreamEvent::Completed(evt.remove("response").filter(Value::is_object))
            }
            _ => UpstreamEvent::Ignored,
        };

        Self {
            kind,
            event,
            response_id,
            usage,
        }
    }
}

fn take_delta(evt: &mut Map<String, Value>) -> String {
    match evt.remove("delta") {
        Some(Value::String(delta)) => delta,
        _ => String::new(),
    }
}

fn failure_message(evt: &Map<String, Value>) -> String {
    evt.get("response")
        .and_then(|r| r.get("error"))
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("response.failed")
        .to_string()
}

fn web_search_event(kind: &str, evt: &mut Map<String, Value>) -> WebSearchEvent {
    let call_id = evt
        .get("item_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .unwrap_or("ws_call")
        .to_string();
    let item = match evt.remove("item") {
        Some(Value::Object(item)) => item,
        _ => Map::new(),
    };
    WebSearchEvent {
        call_id,
        item,
        event: std::mem::take(evt),
        finished: kind.ends_with(".completed") || kind.ends_with(".done"),
    }
}
