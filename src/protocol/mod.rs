pub mod canonical;
pub(crate) mod error_shapes;
pub mod ollama;
pub mod openai_chat;
pub mod openai_completions;
pub mod responses;
