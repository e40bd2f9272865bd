//! Wire vocabulary of the upstream Responses API: the request payload we
//! send and the SSE event records we read back.

pub mod events;
pub mod payload;
pub mod tool_args;

pub use events::{ParsedEvent, UpstreamEvent, WebSearchEvent};
pub use payload::ResponsesPayload;
pub use tool_args::{merge_tool_params, serialize_tool_args, PARAM_SYNONYMS};
