//! Upstream event stream -> client chunk state machine.

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::policy::reasoning::{THINK_CLOSE, THINK_OPEN};
use crate::protocol::canonical::{CanonicalUsage, CompatibilityMode};
use crate::protocol::responses::{
    merge_tool_params, serialize_tool_args, ParsedEvent, UpstreamEvent, WebSearchEvent,
};

const WEB_SEARCH_TOOL_NAME: &str = "web_search";
const PARAGRAPH_BREAK: &str = "\n";

/// Protocol-neutral unit produced by [`StreamTranslator`]; each client
/// protocol encodes these into its own wire frames.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Visible text, including think markers in think-tags mode.
    Content(String),
    /// Reasoning as a separate structured field.
    ReasoningStructured(String),
    /// Reasoning as flat fields; `summary` tells summary deltas from full text.
    ReasoningFlat { text: String, summary: bool },
    ToolCall(ToolCallChunk),
    /// A built-in tool call finished on its own event.
    ToolCallsFinished,
    /// `response.output_text.done`.
    TextDone,
    Failed(String),
    Completed { usage: Option<CanonicalUsage> },
    /// Upstream sent a literal `[DONE]`.
    Sentinel,
    /// Upstream ended without a completion event.
    Ended { usage: Option<CanonicalUsage> },
}

/// Accumulated state of one tool call as sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallChunk {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub arguments: String,
    /// Set on the finalize event; the chunk then also closes the turn.
    pub finished: bool,
}

/// Whether the translator should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamState {
    pub think_open: bool,
    pub think_closed: bool,
    pub saw_any_summary: bool,
    pub pending_paragraph: bool,
}

#[derive(Debug, Default)]
struct ToolCallEntry {
    params: Option<Map<String, Value>>,
    index: usize,
}

/// `call_id -> {merged params, stable output index}`.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    entries: FxHashMap<String, ToolCallEntry>,
    next_index: usize,
}

impl ToolCallAccumulator {
    fn entry(&mut self, call_id: &str) -> &mut ToolCallEntry {
        let next_index = &mut self.next_index;
        self.entries
            .entry(call_id.to_string())
            .or_insert_with(|| {
                let index = *next_index;
                *next_index += 1;
                ToolCallEntry {
                    params: None,
                    index,
                }
            })
    }

    /// Stable output index of `call_id`, assigned on first sight.
    pub fn index_of(&mut self, call_id: &str) -> usize {
        self.entry(call_id).index
    }

    /// Merge parameter sources into `call_id` and return the merged params.
    pub fn merge(&mut self, call_id: &str, sources: &[&Map<String, Value>]) -> Value {
        let entry = self.entry(call_id);
        let params = entry.params.get_or_insert_with(Map::new);
        for src in sources {
            merge_tool_params(params, src);
        }
        Value::Object(params.clone())
    }

    fn absorb_object(&mut self, call_id: &str, args: &Map<String, Value>) {
        let params = self.entry(call_id).params.get_or_insert_with(Map::new);
        for (k, v) in args {
            params.insert(k.clone(), v.clone());
        }
    }

    fn params(&self, call_id: &str) -> Option<Value> {
        self.entries
            .get(call_id)
            .and_then(|e| e.params.as_ref())
            .map(|p| Value::Object(p.clone()))
    }
}

/// Per-stream translator. `exposure` of `None` hides reasoning entirely.
#[derive(Debug)]
pub struct StreamTranslator {
    exposure: Option<CompatibilityMode>,
    state: StreamState,
    tools: ToolCallAccumulator,
    response_id: Option<String>,
    usage: Option<CanonicalUsage>,
    terminated: bool,
    verbose: bool,
}

impl StreamTranslator {
    #[must_use]
    pub fn new(exposure: Option<CompatibilityMode>, verbose: bool) -> Self {
        Self {
            exposure,
            state: StreamState::default(),
            tools: ToolCallAccumulator::default(),
            response_id: None,
            usage: None,
            terminated: false,
            verbose,
        }
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Latest upstream response id seen on any event.
    #[must_use]
    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    #[must_use]
    pub fn usage(&self) -> Option<&CanonicalUsage> {
        self.usage.as_ref()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Apply one decoded upstream event.
    pub fn on_event(&mut self, parsed: ParsedEvent, out: &mut Vec<StreamChunk>) -> Flow {
        if self.terminated {
            return Flow::Stop;
        }
        if let Some(id) = parsed.response_id {
            self.response_id = Some(id);
        }

        match parsed.event {
            UpstreamEvent::OutputTextDelta(delta) => {
                self.close_think(out);
                out.push(StreamChunk::Content(delta));
            }
            UpstreamEvent::OutputTextDone => out.push(StreamChunk::TextDone),
            UpstreamEvent::ReasoningSummaryPartAdded => {
                if matches!(
                    self.exposure,
                    Some(CompatibilityMode::ThinkTags | CompatibilityMode::O3)
                ) {
                    if self.state.saw_any_summary {
                        self.state.pending_paragraph = true;
                    } else {
                        self.state.saw_any_summary = true;
                    }
                }
            }
            UpstreamEvent::ReasoningSummaryDelta(delta) => self.on_reasoning(delta, true, out),
            UpstreamEvent::ReasoningTextDelta(delta) => self.on_reasoning(delta, false, out),
            UpstreamEvent::WebSearch(ws) => {
                if self.verbose {
                    tracing::info!(
                        kind = parsed.kind.as_deref().unwrap_or_default(),
                        call_id = %ws.call_id,
                        "tool event -> tool_calls(web_search)"
                    );
                }
                self.on_web_search(ws, out);
            }
            UpstreamEvent::OutputItemDone(item) => self.on_output_item_done(&item, out),
            UpstreamEvent::Failed(message) => {
                self.close_think(out);
                out.push(StreamChunk::Failed(message));
                self.terminated = true;
                return Flow::Stop;
            }
            UpstreamEvent::Completed(_) => {
                if parsed.usage.is_some() {
                    self.usage = parsed.usage;
                }
                self.close_think(out);
                out.push(StreamChunk::Completed { usage: self.usage });
                self.terminated = true;
                return Flow::Stop;
            }
            UpstreamEvent::Done => {
                out.push(StreamChunk::Sentinel);
                self.finish(out);
                return Flow::Stop;
            }
            UpstreamEvent::Ignored => {}
        }
        Flow::Continue
    }

    /// The upstream ended (or broke) before a terminal event.
    pub fn finish(&mut self, out: &mut Vec<StreamChunk>) {
        if self.terminated {
            return;
        }
        self.close_think(out);
        out.push(StreamChunk::Ended { usage: self.usage });
        self.terminated = true;
    }

    fn close_think(&mut self, out: &mut Vec<StreamChunk>) {
        if self.exposure == Some(CompatibilityMode::ThinkTags)
            && self.state.think_open
            && !self.state.think_closed
        {
            out.push(StreamChunk::Content(THINK_CLOSE.to_string()));
            self.state.think_open = false;
            self.state.think_closed = true;
        }
    }

    fn take_paragraph_break(&mut self, summary: bool) -> bool {
        if summary && self.state.pending_paragraph {
            self.state.pending_paragraph = false;
            true
        } else {
            false
        }
    }

    fn on_reasoning(&mut self, delta: String, summary: bool, out: &mut Vec<StreamChunk>) {
        match self.exposure {
            None => {}
            Some(CompatibilityMode::O3) => {
                if self.take_paragraph_break(summary) {
                    out.push(StreamChunk::ReasoningStructured(PARAGRAPH_BREAK.to_string()));
                }
                out.push(StreamChunk::ReasoningStructured(delta));
            }
            Some(CompatibilityMode::ThinkTags) => {
                if !self.state.think_open && !self.state.think_closed {
                    out.push(StreamChunk::Content(THINK_OPEN.to_string()));
                    self.state.think_open = true;
                }
                if self.state.think_open && !self.state.think_closed {
                    if self.take_paragraph_break(summary) {
                        out.push(StreamChunk::Content(PARAGRAPH_BREAK.to_string()));
                    }
                    out.push(StreamChunk::Content(delta));
                }
            }
            Some(CompatibilityMode::Legacy) => {
                out.push(StreamChunk::ReasoningFlat {
                    text: delta,
                    summary,
                });
            }
        }
    }

    fn on_web_search(&mut self, ws: WebSearchEvent, out: &mut Vec<StreamChunk>) {
        let params = self.tools.merge(&ws.call_id, &[&ws.item, &ws.event]);
        let index = self.tools.index_of(&ws.call_id);
        out.push(StreamChunk::ToolCall(ToolCallChunk {
            index,
            id: ws.call_id,
            name: WEB_SEARCH_TOOL_NAME.to_string(),
            arguments: serialize_tool_args(&params),
            finished: false,
        }));
        if ws.finished {
            out.push(StreamChunk::ToolCallsFinished);
        }
    }

    fn on_output_item_done(&mut self, item: &Value, out: &mut Vec<StreamChunk>) {
        let kind = item.get("type").and_then(Value::as_str);
        let is_web_search = kind == Some("web_search_call");
        if kind != Some("function_call") && !is_web_search {
            return;
        }

        let non_empty_str = |key: &str| {
            item.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        };
        let call_id = non_empty_str("call_id")
            .or_else(|| non_empty_str("id"))
            .unwrap_or_default()
            .to_string();
        let name = non_empty_str("name")
            .unwrap_or(if is_web_search { WEB_SEARCH_TOOL_NAME } else { "" })
            .to_string();
        let raw_args = ["arguments", "parameters"]
            .into_iter()
            .filter_map(|key| item.get(key))
            .find(|v| is_truthy(v));

        if let Some(Value::Object(args)) = raw_args {
            self.tools.absorb_object(&call_id, args);
        }
        let effective = self.tools.params(&call_id).unwrap_or_else(|| match raw_args {
            Some(v @ (Value::Object(_) | Value::Array(_) | Value::String(_))) => v.clone(),
            _ => Value::Object(Map::new()),
        });
        if is_web_search && self.verbose {
            tracing::info!(call_id = %call_id, "output_item.done web_search_call");
        }

        let index = self.tools.index_of(&call_id);
        out.push(StreamChunk::ToolCall(ToolCallChunk {
            index,
            id: call_id,
            name,
            arguments: serialize_tool_args(&effective),
            finished: true,
        }));
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
