use axum::http::HeaderMap;
use serde_json::{Map, Value};

use crate::error::GatewayError;

const MAX_UPSTREAM_ERROR_LEN: usize = 500;
const DEFAULT_UPSTREAM_ERROR: &str = "Upstream error";

/// Parse a request body into a JSON object. An empty body is `{}`.
///
/// With `strip_newlines`, a body that fails to parse is retried once with
/// every `\r` and `\n` removed (clients that paste raw newlines into strings).
///
/// # Errors
///
/// Returns [`GatewayError::InvalidBody`] when the body is not a JSON object.
pub(crate) fn parse_json_object(
    body: &[u8],
    strip_newlines: bool,
) -> Result<Map<String, Value>, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    let parsed = match serde_json::from_slice::<Value>(body) {
        Ok(value) => value,
        Err(_) if strip_newlines => {
            let cleaned: Vec<u8> = body
                .iter()
                .copied()
                .filter(|b| *b != b'\r' && *b != b'\n')
                .collect();
            serde_json::from_slice::<Value>(&cleaned).map_err(|_| invalid_json())?
        }
        Err(_) => return Err(invalid_json()),
    };
    match parsed {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_json()),
    }
}

fn invalid_json() -> GatewayError {
    GatewayError::InvalidBody("Invalid JSON body".to_string())
}

/// Session id supplied by the client: `X-Session-Id`, else `session_id`.
#[must_use]
pub(crate) fn client_session_id(headers: &HeaderMap) -> Option<&str> {
    ["x-session-id", "session_id"].into_iter().find_map(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}

pub(crate) fn str_field<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

pub(crate) fn bool_field(payload: &Map<String, Value>, key: &str, default: bool) -> bool {
    payload.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// `stream_options.include_usage`, default false.
pub(crate) fn include_usage(payload: &Map<String, Value>) -> bool {
    payload
        .get("stream_options")
        .and_then(|opts| opts.get("include_usage"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Extract `error.message` from an upstream error body, capped in length.
#[must_use]
pub(crate) fn upstream_error_message(body: &[u8]) -> String {
    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return DEFAULT_UPSTREAM_ERROR.to_string();
    };
    let Some(msg) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    else {
        return DEFAULT_UPSTREAM_ERROR.to_string();
    };
    if msg.len() <= MAX_UPSTREAM_ERROR_LEN {
        return msg.to_string();
    }
    let mut cut = MAX_UPSTREAM_ERROR_LEN;
    while !msg.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &msg[..cut])
}
