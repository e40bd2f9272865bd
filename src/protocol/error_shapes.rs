use crate::error::ErrorCategory;

fn openai_error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request_error",
        ErrorCategory::Authentication => "authentication_error",
        ErrorCategory::Permission => "permission_error",
        ErrorCategory::NotFound => "not_found_error",
        ErrorCategory::RateLimit => "rate_limit_error",
        ErrorCategory::ServerError => "server_error",
    }
}

#[must_use]
pub(crate) fn openai_error_payload(
    cat: ErrorCategory,
    code: &str,
    message: &str,
) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "type": openai_error_type(cat),
            "code": code,
        }
    })
}

#[must_use]
pub(crate) fn ollama_error_payload(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "code": code,
        }
    })
}

/// Body emitted inside a stream when the upstream reports a failure event.
#[must_use]
pub(crate) fn stream_failure_payload(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": { "message": message } })
}
