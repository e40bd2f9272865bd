pub mod ollama;
pub mod openai_chat;
pub mod openai_completions;
pub mod openai_responses;
