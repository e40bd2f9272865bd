pub mod response;
pub mod stream;

pub use response::build_chat_completion;
pub use stream::ChatChunkEncoder;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::protocol::canonical::CanonicalUsage;

/// `OpenAI` Chat Completion response wire type.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiChatResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<OpenAiChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CanonicalUsage>,
}

/// A single choice in the response.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiChoice {
    pub index: u32,
    /// Assistant message; reasoning fields vary with the compatibility mode.
    pub message: Map<String, Value>,
    pub finish_reason: &'static str,
}

/// A tool call within a message.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub function: OpenAiToolCallFunction,
}

/// The function part of a tool call.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiToolCallFunction {
    pub name: String,
    pub arguments: String,
}
