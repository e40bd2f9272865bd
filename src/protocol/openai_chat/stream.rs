use bytes::Bytes;

use crate::protocol::canonical::CanonicalUsage;
use crate::protocol::error_shapes::stream_failure_payload;
use crate::stream::{sse_data_frame, ChunkEncoder, StreamChunk, ToolCallChunk, DONE_FRAME};
use crate::util::{push_json_string_escaped, push_u64_decimal, push_usize_decimal};

const DEFAULT_STREAM_ID: &str = "chatcmpl-stream";

/// Encodes translator chunks as `chat.completion.chunk` SSE frames.
#[derive(Debug, Clone)]
pub struct ChatChunkEncoder {
    model: String,
    created: u64,
    include_usage: bool,
}

impl ChatChunkEncoder {
    #[must_use]
    pub fn new(model: impl Into<String>, created: u64, include_usage: bool) -> Self {
        Self {
            model: model.into(),
            created,
            include_usage,
        }
    }

    fn frame(&self, id: &str, delta: &str, finish_reason: Option<&str>) -> Bytes {
        let mut out = String::with_capacity(128 + id.len() + self.model.len() + delta.len());
        push_openai_chunk_prefix(&mut out, id, &self.model, self.created);
        out.push_str(",\"choices\":[{\"index\":0,\"delta\":");
        out.push_str(delta);
        out.push_str(",\"finish_reason\":");
        match finish_reason {
            Some(reason) => push_json_string_escaped(&mut out, reason),
            None => out.push_str("null"),
        }
        out.push_str("}]}\n\n");
        Bytes::from(out)
    }

    fn usage_frame(&self, id: &str, usage: &CanonicalUsage) -> Bytes {
        let mut out = String::with_capacity(224 + id.len() + self.model.len());
        push_openai_chunk_prefix(&mut out, id, &self.model, self.created);
        out.push_str(
            ",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":null}],\"usage\":{\"prompt_tokens\":",
        );
        push_u64_decimal(&mut out, usage.prompt_tokens);
        out.push_str(",\"completion_tokens\":");
        push_u64_decimal(&mut out, usage.completion_tokens);
        out.push_str(",\"total_tokens\":");
        push_u64_decimal(&mut out, usage.total_tokens);
        out.push_str("}}\n\n");
        Bytes::from(out)
    }
}

impl ChunkEncoder for ChatChunkEncoder {
    fn encode(&mut self, chunk: &StreamChunk, response_id: Option<&str>, out: &mut Vec<Bytes>) {
        let id = response_id.unwrap_or(DEFAULT_STREAM_ID);
        match chunk {
            StreamChunk::Content(text) => {
                let mut delta = String::with_capacity(16 + text.len());
                delta.push_str("{\"content\":");
                push_json_string_escaped(&mut delta, text);
                delta.push('}');
                out.push(self.frame(id, &delta, None));
            }
            StreamChunk::ReasoningStructured(text) => {
                let mut delta = String::with_capacity(64 + text.len());
                delta.push_str("{\"reasoning\":{\"content\":[{\"type\":\"text\",\"text\":");
                push_json_string_escaped(&mut delta, text);
                delta.push_str("}]}}");
                out.push(self.frame(id, &delta, None));
            }
            StreamChunk::ReasoningFlat { text, summary } => {
                let mut delta = String::with_capacity(48 + 2 * text.len());
                delta.push('{');
                if *summary {
                    delta.push_str("\"reasoning_summary\":");
                    push_json_string_escaped(&mut delta, text);
                    delta.push(',');
                }
                delta.push_str("\"reasoning\":");
                push_json_string_escaped(&mut delta, text);
                delta.push('}');
                out.push(self.frame(id, &delta, None));
            }
            StreamChunk::ToolCall(call) => {
                let delta = tool_call_delta(call);
                let finish = call.finished.then_some("tool_calls");
                out.push(self.frame(id, &delta, finish));
            }
            StreamChunk::ToolCallsFinished => {
                out.push(self.frame(id, "{}", Some("tool_calls")));
            }
            StreamChunk::Failed(message) => {
                out.push(sse_data_frame(&stream_failure_payload(message).to_string()));
            }
            StreamChunk::Completed { usage } => {
                if let (true, Some(usage)) = (self.include_usage, usage) {
                    out.push(self.usage_frame(id, usage));
                }
                out.push(Bytes::from_static(DONE_FRAME.as_bytes()));
            }
            StreamChunk::Ended { .. } => {
                out.push(Bytes::from_static(DONE_FRAME.as_bytes()));
            }
            StreamChunk::TextDone | StreamChunk::Sentinel => {}
        }
    }
}

fn tool_call_delta(call: &ToolCallChunk) -> String {
    let mut delta =
        String::with_capacity(96 + call.id.len() + call.name.len() + call.arguments.len());
    delta.push_str("{\"tool_calls\":[{\"index\":");
    push_usize_decimal(&mut delta, call.index);
    delta.push_str(",\"id\":");
    push_json_string_escaped(&mut delta, &call.id);
    delta.push_str(",\"type\":\"function\",\"function\":{\"name\":");
    push_json_string_escaped(&mut delta, &call.name);
    delta.push_str(",\"arguments\":");
    push_json_string_escaped(&mut delta, &call.arguments);
    delta.push_str("}}]}");
    delta
}

fn push_openai_chunk_prefix(out: &mut String, id: &str, model: &str, created: u64) {
    out.push_str("data: {\"id\":");
    push_json_string_escaped(out, id);
    out.push_str(",\"object\":\"chat.completion.chunk\",\"created\":");
    push_u64_decimal(out, created);
    out.push_str(",\"model\":");
    push_json_string_escaped(out, model);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn encode(chunk: StreamChunk, response_id: Option<&str>, include_usage: bool) -> Vec<String> {
        let mut encoder = ChatChunkEncoder::new("gpt-5", 1_700_000_000, include_usage);
        let mut out = Vec::new();
        encoder.encode(&chunk, response_id, &mut out);
        out.into_iter()
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect()
    }

    fn parse(frame: &str) -> Value {
        let body = frame
            .strip_prefix("data: ")
            .and_then(|s| s.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_content_chunk_shape() {
        let frames = encode(StreamChunk::Content("Hi \"there\"".into()), None, false);
        assert_eq!(
            parse(&frames[0]),
            json!({
                "id": "chatcmpl-stream",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000u64,
                "model": "gpt-5",
                "choices": [{"index": 0, "delta": {"content": "Hi \"there\""}, "finish_reason": null}]
            })
        );
    }

    #[test]
    fn test_reasoning_shapes() {
        let o3 = encode(StreamChunk::ReasoningStructured("r".into()), Some("resp_1"), false);
        let v = parse(&o3[0]);
        assert_eq!(v["id"], "resp_1");
        assert_eq!(
            v["choices"][0]["delta"],
            json!({"reasoning": {"content": [{"type": "text", "text": "r"}]}})
        );

        let summary = encode(
            StreamChunk::ReasoningFlat {
                text: "s".into(),
                summary: true,
            },
            None,
            false,
        );
        assert_eq!(
            parse(&summary[0])["choices"][0]["delta"],
            json!({"reasoning_summary": "s", "reasoning": "s"})
        );

        let full = encode(
            StreamChunk::ReasoningFlat {
                text: "f".into(),
                summary: false,
            },
            None,
            false,
        );
        assert_eq!(parse(&full[0])["choices"][0]["delta"], json!({"reasoning": "f"}));
    }

    #[test]
    fn test_tool_call_chunks() {
        let call = ToolCallChunk {
            index: 2,
            id: "ws_1".into(),
            name: "web_search".into(),
            arguments: r#"{"query":"cats"}"#.into(),
            finished: false,
        };
        let partial = parse(&encode(StreamChunk::ToolCall(call.clone()), None, false)[0]);
        assert_eq!(
            partial["choices"][0]["delta"]["tool_calls"][0],
            json!({
                "index": 2,
                "id": "ws_1",
                "type": "function",
                "function": {"name": "web_search", "arguments": "{\"query\":\"cats\"}"}
            })
        );
        assert_eq!(partial["choices"][0]["finish_reason"], Value::Null);

        let finished = ToolCallChunk {
            finished: true,
            ..call
        };
        let done = parse(&encode(StreamChunk::ToolCall(finished), None, false)[0]);
        assert_eq!(done["choices"][0]["finish_reason"], "tool_calls");

        let closing = parse(&encode(StreamChunk::ToolCallsFinished, None, false)[0]);
        assert_eq!(closing["choices"][0]["delta"], json!({}));
        assert_eq!(closing["choices"][0]["finish_reason"], "tool_calls");
    }

    #[test]
    fn test_completion_with_and_without_usage() {
        let usage = Some(CanonicalUsage {
            prompt_tokens: 3,
            completion_tokens: 4,
            total_tokens: 7,
        });
        let with = encode(StreamChunk::Completed { usage }, None, true);
        assert_eq!(with.len(), 2);
        let usage_chunk = parse(&with[0]);
        assert_eq!(
            usage_chunk["usage"],
            json!({"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7})
        );
        assert_eq!(usage_chunk["choices"][0]["delta"], json!({}));
        assert_eq!(with[1], "data: [DONE]\n\n");

        let without = encode(StreamChunk::Completed { usage }, None, false);
        assert_eq!(without, vec!["data: [DONE]\n\n".to_string()]);
    }

    #[test]
    fn test_failure_frame() {
        let frames = encode(StreamChunk::Failed("oops".into()), None, false);
        assert_eq!(parse(&frames[0]), json!({"error": {"message": "oops"}}));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_silent_chunks() {
        assert!(encode(StreamChunk::TextDone, None, false).is_empty());
        assert!(encode(StreamChunk::Sentinel, None, false).is_empty());
    }
}
