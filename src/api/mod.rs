pub(crate) mod common;
pub(crate) mod engine;
pub mod health;
pub mod ingress;
pub mod models;

pub use ingress::{ollama, openai_chat, openai_completions, openai_responses};
