pub mod input;
pub mod tools;

pub use input::{convert_chat_messages, normalize_image_data_url, relocate_system_message};
pub use tools::{
    convert_function_tools, convert_responses_tools, resolve_extra_tools, ExtraTools,
    MAX_EXTRA_TOOLS_BYTES,
};
