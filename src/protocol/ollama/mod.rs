//! Ollama `/api/chat` request conversion and NDJSON response shapes.

pub mod request;
pub mod response;
pub mod stream;

pub use request::{convert_ollama_messages, normalize_ollama_tools, to_data_url};
pub use response::build_ollama_chat;
pub use stream::NdjsonEncoder;
