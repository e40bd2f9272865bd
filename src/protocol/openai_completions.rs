//! Legacy `/v1/completions` wire shapes.

use bytes::Bytes;
use serde::Serialize;

use crate::protocol::canonical::CanonicalUsage;
use crate::protocol::error_shapes::stream_failure_payload;
use crate::stream::{sse_data_frame, Aggregate, ChunkEncoder, StreamChunk, DONE_FRAME};
use crate::util::{push_json_string_escaped, push_u64_decimal};

const DEFAULT_STREAM_ID: &str = "cmpl-stream";
const DEFAULT_RESPONSE_ID: &str = "cmpl";

/// `text_completion` response wire type.
#[derive(Debug, Clone, Serialize)]
pub struct TextCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<TextChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CanonicalUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextChoice {
    pub index: u32,
    pub text: String,
    pub finish_reason: &'static str,
    /// Always `null`.
    pub logprobs: Option<()>,
}

#[must_use]
pub fn build_text_completion(agg: &Aggregate, model: &str, created: u64) -> TextCompletionResponse {
    TextCompletionResponse {
        id: agg
            .response_id
            .clone()
            .unwrap_or_else(|| DEFAULT_RESPONSE_ID.to_string()),
        object: "text_completion",
        created,
        model: model.to_string(),
        choices: vec![TextChoice {
            index: 0,
            text: agg.text.clone(),
            finish_reason: "stop",
            logprobs: None,
        }],
        usage: agg.usage,
    }
}

/// Encodes translator chunks as `text_completion.chunk` SSE frames.
#[derive(Debug, Clone)]
pub struct TextChunkEncoder {
    model: String,
    created: u64,
    include_usage: bool,
}

impl TextChunkEncoder {
    #[must_use]
    pub fn new(model: impl Into<String>, created: u64, include_usage: bool) -> Self {
        Self {
            model: model.into(),
            created,
            include_usage,
        }
    }

    fn frame(
        &self,
        id: &str,
        text: &str,
        finish_reason: Option<&str>,
        usage: Option<&CanonicalUsage>,
    ) -> Bytes {
        let mut out = String::with_capacity(160 + id.len() + self.model.len() + text.len());
        out.push_str("data: {\"id\":");
        push_json_string_escaped(&mut out, id);
        out.push_str(",\"object\":\"text_completion.chunk\",\"created\":");
        push_u64_decimal(&mut out, self.created);
        out.push_str(",\"model\":");
        push_json_string_escaped(&mut out, &self.model);
        out.push_str(",\"choices\":[{\"index\":0,\"text\":");
        push_json_string_escaped(&mut out, text);
        out.push_str(",\"finish_reason\":");
        match finish_reason {
            Some(reason) => push_json_string_escaped(&mut out, reason),
            None => out.push_str("null"),
        }
        out.push_str("}]");
        if let Some(usage) = usage {
            out.push_str(",\"usage\":{\"prompt_tokens\":");
            push_u64_decimal(&mut out, usage.prompt_tokens);
            out.push_str(",\"completion_tokens\":");
            push_u64_decimal(&mut out, usage.completion_tokens);
            out.push_str(",\"total_tokens\":");
            push_u64_decimal(&mut out, usage.total_tokens);
            out.push('}');
        }
        out.push_str("}\n\n");
        Bytes::from(out)
    }
}

impl ChunkEncoder for TextChunkEncoder {
    fn encode(&mut self, chunk: &StreamChunk, response_id: Option<&str>, out: &mut Vec<Bytes>) {
        let id = response_id.unwrap_or(DEFAULT_STREAM_ID);
        match chunk {
            StreamChunk::Content(text) => out.push(self.frame(id, text, None, None)),
            StreamChunk::TextDone | StreamChunk::Sentinel => {
                out.push(self.frame(id, "", Some("stop"), None));
            }
            StreamChunk::Failed(message) => {
                out.push(sse_data_frame(&stream_failure_payload(message).to_string()));
            }
            StreamChunk::Completed { usage } => {
                if let (true, Some(usage)) = (self.include_usage, usage) {
                    out.push(self.frame(id, "", None, Some(usage)));
                }
                out.push(Bytes::from_static(DONE_FRAME.as_bytes()));
            }
            StreamChunk::Ended { .. } => out.push(Bytes::from_static(DONE_FRAME.as_bytes())),
            StreamChunk::ReasoningStructured(_)
            | StreamChunk::ReasoningFlat { .. }
            | StreamChunk::ToolCall(_)
            | StreamChunk::ToolCallsFinished => {}
        }
    }
}
