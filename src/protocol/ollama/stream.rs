use bytes::Bytes;
use serde_json::{json, Map, Value};

use crate::protocol::canonical::CanonicalUsage;
use crate::stream::{ndjson_line, ChunkEncoder, StreamChunk, ToolCallChunk};

/// Encodes translator chunks as Ollama NDJSON objects.
#[derive(Debug, Clone)]
pub struct NdjsonEncoder {
    model: String,
    created_at: String,
    done: bool,
}

impl NdjsonEncoder {
    #[must_use]
    pub fn new(model: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            created_at: created_at.into(),
            done: false,
        }
    }

    fn message_line(&self, message: Value) -> Bytes {
        let line = json!({
            "model": self.model,
            "created_at": self.created_at,
            "message": message,
            "done": false,
        });
        ndjson_line(&line.to_string())
    }

    fn done_line(&mut self, usage: Option<&CanonicalUsage>) -> Option<Bytes> {
        if self.done {
            return None;
        }
        self.done = true;
        let line = done_object(&self.model, &self.created_at, usage, Map::new());
        Some(ndjson_line(&line.to_string()))
    }
}

/// Final Ollama object. `message` fields beyond role/content come from `extra`.
pub(crate) fn done_object(
    model: &str,
    created_at: &str,
    usage: Option<&CanonicalUsage>,
    extra: Map<String, Value>,
) -> Value {
    let mut message = Map::new();
    message.insert("role".into(), Value::String("assistant".into()));
    message.insert("content".into(), Value::String(String::new()));
    message.extend(extra);

    let mut obj = Map::new();
    obj.insert("model".into(), Value::String(model.to_string()));
    obj.insert("created_at".into(), Value::String(created_at.to_string()));
    obj.insert("message".into(), Value::Object(message));
    obj.insert("done".into(), Value::Bool(true));
    obj.insert("done_reason".into(), Value::String("stop".into()));
    obj.insert(
        "prompt_eval_count".into(),
        Value::from(usage.map_or(0, |u| u.prompt_tokens)),
    );
    if let Some(usage) = usage {
        obj.insert("eval_count".into(), Value::from(usage.completion_tokens));
    }
    Value::Object(obj)
}

/// Ollama tool call: the arguments are an object, not a JSON string.
pub(crate) fn ollama_tool_call(name: &str, arguments: &str) -> Value {
    let arguments = match serde_json::from_str::<Value>(arguments) {
        Ok(obj @ Value::Object(_)) => obj,
        _ => Value::Object(Map::new()),
    };
    json!({"function": {"name": name, "arguments": arguments}})
}

fn finished_call_message(call: &ToolCallChunk) -> Value {
    json!({
        "role": "assistant",
        "content": "",
        "tool_calls": [ollama_tool_call(&call.name, &call.arguments)],
    })
}

impl ChunkEncoder for NdjsonEncoder {
    fn encode(&mut self, chunk: &StreamChunk, _response_id: Option<&str>, out: &mut Vec<Bytes>) {
        if self.done {
            return;
        }
        match chunk {
            StreamChunk::Content(text) => {
                if !text.is_empty() {
                    out.push(self.message_line(json!({"role": "assistant", "content": text})));
                }
            }
            StreamChunk::ReasoningStructured(text) | StreamChunk::ReasoningFlat { text, .. } => {
                if !text.is_empty() {
                    out.push(self.message_line(
                        json!({"role": "assistant", "content": "", "thinking": text}),
                    ));
                }
            }
            StreamChunk::ToolCall(call) if call.finished => {
                out.push(self.message_line(finished_call_message(call)));
            }
            StreamChunk::Failed(message) => {
                self.done = true;
                let line = json!({"error": message, "done": true});
                out.push(ndjson_line(&line.to_string()));
            }
            StreamChunk::Completed { usage } | StreamChunk::Ended { usage } => {
                out.extend(self.done_line(usage.as_ref()));
            }
            StreamChunk::ToolCall(_)
            | StreamChunk::ToolCallsFinished
            | StreamChunk::TextDone
            | StreamChunk::Sentinel => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(encoder: &mut NdjsonEncoder, chunk: StreamChunk) -> Vec<Value> {
        let mut out = Vec::new();
        encoder.encode(&chunk, None, &mut out);
        out.into_iter()
            .map(|b| {
                let s = String::from_utf8(b.to_vec()).unwrap();
                assert!(s.ends_with('\n'));
                serde_json::from_str(s.trim_end()).unwrap()
            })
            .collect()
    }

    fn encoder() -> NdjsonEncoder {
        NdjsonEncoder::new("gpt-5", "2026-01-01T00:00:00Z")
    }

    #[test]
    fn test_content_line() {
        let mut enc = encoder();
        let lines = encode(&mut enc, StreamChunk::Content("Hi".into()));
        assert_eq!(
            lines[0],
            json!({
                "model": "gpt-5",
                "created_at": "2026-01-01T00:00:00Z",
                "message": {"role": "assistant", "content": "Hi"},
                "done": false
            })
        );
        assert!(encode(&mut enc, StreamChunk::Content(String::new())).is_empty());
    }

    #[test]
    fn test_thinking_and_tool_calls() {
        let mut enc = encoder();
        let thinking = encode(&mut enc, StreamChunk::ReasoningStructured("S".into()));
        assert_eq!(thinking[0]["message"]["thinking"], "S");

        let mut call = ToolCallChunk {
            index: 0,
            id: "c1".into(),
            name: "f".into(),
            arguments: r#"{"a":1}"#.into(),
            finished: false,
        };
        assert!(encode(&mut enc, StreamChunk::ToolCall(call.clone())).is_empty());
        call.finished = true;
        let lines = encode(&mut enc, StreamChunk::ToolCall(call));
        assert_eq!(
            lines[0]["message"]["tool_calls"],
            json!([{"function": {"name": "f", "arguments": {"a": 1}}}])
        );
    }

    #[test]
    fn test_done_object_emitted_once() {
        let mut enc = encoder();
        let usage = CanonicalUsage {
            prompt_tokens: 5,
            completion_tokens: 6,
            total_tokens: 11,
        };
        let lines = encode(&mut enc, StreamChunk::Completed { usage: Some(usage) });
        assert_eq!(lines[0]["done"], true);
        assert_eq!(lines[0]["done_reason"], "stop");
        assert_eq!(lines[0]["prompt_eval_count"], 5);
        assert_eq!(lines[0]["eval_count"], 6);
        assert!(encode(&mut enc, StreamChunk::Ended { usage: None }).is_empty());
    }

    #[test]
    fn test_early_end_still_emits_done() {
        let mut enc = encoder();
        let lines = encode(&mut enc, StreamChunk::Ended { usage: None });
        assert_eq!(lines[0]["done"], true);
        assert_eq!(lines[0]["prompt_eval_count"], 0);
        assert!(lines[0].get("eval_count").is_none());
    }

    #[test]
    fn test_failure_line() {
        let mut enc = encoder();
        let lines = encode(&mut enc, StreamChunk::Failed("oops".into()));
        assert_eq!(lines[0], json!({"error": "oops", "done": true}));
        assert!(encode(&mut enc, StreamChunk::Content("x".into())).is_empty());
    }
}
