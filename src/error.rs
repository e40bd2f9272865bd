use crate::protocol::canonical::IngressApi;
use crate::protocol::error_shapes::{ollama_error_payload, openai_error_payload};

/// Gateway error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidBody(String),
    #[error("{0}")]
    UnsupportedTool(String),
    #[error("{0}")]
    ToolsTooLarge(String),
    #[error("Missing ChatGPT credentials. Sign in and make sure auth.json is readable.")]
    MissingCredentials,
    #[error("{message}")]
    UpstreamRejected { status: u16, message: String },
    #[error("{message}")]
    ToolsRejected { status: u16, message: String },
    #[error("Upstream ChatGPT request failed: {0}")]
    UpstreamUnreachable(String),
    #[error("{0}")]
    UpstreamFailedMidStream(String),
    #[error("{0}")]
    NotFound(String),
}

/// Broad error category used to pick the error `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    Permission,
    NotFound,
    RateLimit,
    ServerError,
}

/// Map an upstream HTTP status code to an error category.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::Permission,
        404 => ErrorCategory::NotFound,
        429 => ErrorCategory::RateLimit,
        400..=499 => ErrorCategory::InvalidRequest,
        _ => ErrorCategory::ServerError,
    }
}

/// Upstream statuses that are not client/server errors are reported as 502.
#[must_use]
pub fn coerce_upstream_status(status: u16) -> http::StatusCode {
    if (400..=599).contains(&status) {
        http::StatusCode::from_u16(status).unwrap_or(http::StatusCode::BAD_GATEWAY)
    } else {
        http::StatusCode::BAD_GATEWAY
    }
}

impl GatewayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::InvalidBody(_)
            | GatewayError::UnsupportedTool(_)
            | GatewayError::ToolsTooLarge(_) => ErrorCategory::InvalidRequest,
            GatewayError::MissingCredentials => ErrorCategory::Authentication,
            GatewayError::NotFound(_) => ErrorCategory::NotFound,
            GatewayError::UpstreamUnreachable(_) | GatewayError::UpstreamFailedMidStream(_) => {
                ErrorCategory::ServerError
            }
            GatewayError::UpstreamRejected { status, .. }
            | GatewayError::ToolsRejected { status, .. } => category_from_upstream_status(*status),
        }
    }

    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        match self {
            GatewayError::InvalidBody(_)
            | GatewayError::UnsupportedTool(_)
            | GatewayError::ToolsTooLarge(_) => http::StatusCode::BAD_REQUEST,
            GatewayError::MissingCredentials => http::StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => http::StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnreachable(_) | GatewayError::UpstreamFailedMidStream(_) => {
                http::StatusCode::BAD_GATEWAY
            }
            GatewayError::UpstreamRejected { status, .. }
            | GatewayError::ToolsRejected { status, .. } => coerce_upstream_status(*status),
        }
    }

    /// Machine-readable code carried in the error body.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidBody(_) => "invalid_request",
            GatewayError::UnsupportedTool(_) => "RESPONSES_TOOL_UNSUPPORTED",
            GatewayError::ToolsTooLarge(_) => "RESPONSES_TOOLS_TOO_LARGE",
            GatewayError::MissingCredentials => "missing_credentials",
            GatewayError::UpstreamRejected { .. } => "upstream_error",
            GatewayError::ToolsRejected { .. } => "RESPONSES_TOOLS_REJECTED",
            GatewayError::UpstreamUnreachable(_) => "upstream_unreachable",
            GatewayError::UpstreamFailedMidStream(_) => "upstream_failed",
            GatewayError::NotFound(_) => "not_found",
        }
    }
}

/// Format an error for a given ingress API, returning (`status_code`, JSON body).
#[must_use]
pub fn format_error(
    err: &GatewayError,
    ingress: IngressApi,
) -> (http::StatusCode, serde_json::Value) {
    let message = err.to_string();
    let body = match ingress {
        IngressApi::OpenAiChat | IngressApi::OpenAiCompletions | IngressApi::OpenAiResponses => {
            openai_error_payload(err.category(), err.code(), &message)
        }
        IngressApi::Ollama => ollama_error_payload(err.code(), &message),
    };
    (err.status(), body)
}

/// Convert a `GatewayError` into an axum response for a specific ingress.
#[must_use]
pub fn into_axum_response(err: &GatewayError, ingress: IngressApi) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err, ingress);
    (status, axum::Json(body)).into_response()
}

/// Default `IntoResponse` implementation uses `OpenAiChat` as the fallback ingress.
/// Real handlers should call [`into_axum_response`] with the correct ingress instead.
impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self, IngressApi::OpenAiChat)
    }
}
