//! Shared API helpers reused across ingress handlers.

mod request;
mod response;

pub(crate) use request::{
    bool_field, client_session_id, include_usage, parse_json_object, str_field,
    upstream_error_message,
};
pub(crate) use response::{
    apply_cors, json_bytes_response, json_response, ndjson_response, preflight_response,
    sse_response,
};
