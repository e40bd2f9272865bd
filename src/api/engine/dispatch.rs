use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::api::common::upstream_error_message;
use crate::auth::Credentials;
use crate::error::GatewayError;
use crate::protocol::canonical::{InputItem, ReasoningParam, ToolChoice, ToolSpec};
use crate::protocol::responses::ResponsesPayload;
use crate::state::AppState;
use crate::transport::{TransportError, UpstreamEnvelope, UpstreamRequest};

use super::plan::ToolPlan;

const ACCOUNT_HEADER: HeaderName = HeaderName::from_static("chatgpt-account-id");
const BETA_HEADER: HeaderName = HeaderName::from_static("openai-beta");
const ORIGINATOR_HEADER: HeaderName = HeaderName::from_static("originator");
const SESSION_HEADER: HeaderName = HeaderName::from_static("session_id");

/// Everything needed to issue one logical upstream request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UpstreamCall<'a> {
    pub(crate) model: &'a str,
    pub(crate) instructions: &'a str,
    pub(crate) input: &'a [InputItem],
    pub(crate) tools: &'a ToolPlan,
    pub(crate) reasoning: Option<ReasoningParam>,
    pub(crate) client_session_id: Option<&'a str>,
    /// Top-level fields forwarded verbatim.
    pub(crate) extra_fields: &'a Map<String, Value>,
}

/// Issue `call` upstream and return the unread envelope of a successful
/// response.
///
/// When the upstream rejects a request that carried extra built-in tools, the
/// request is sent exactly once more without them.
///
/// # Errors
///
/// [`GatewayError::MissingCredentials`] without a network attempt,
/// [`GatewayError::UpstreamUnreachable`] on transport failure,
/// [`GatewayError::UpstreamRejected`] for a status >= 400, and
/// [`GatewayError::ToolsRejected`] when the retry fails as well.
pub(crate) async fn dispatch(
    state: &AppState,
    call: &UpstreamCall<'_>,
) -> Result<UpstreamEnvelope, GatewayError> {
    let credentials = state
        .credentials()
        .await
        .ok_or(GatewayError::MissingCredentials)?;
    let session_id = state.sessions().ensure_session_id(
        Some(call.instructions),
        call.input,
        call.client_session_id,
    );
    let headers = upstream_headers(&credentials, &session_id)?;

    let first_tools = call.tools.first_attempt_tools();
    let first = send(state, call, &first_tools, &call.tools.choice, &session_id, &headers)
        .await
        .map_err(transport_failure)?;
    if !first.status.is_client_error() && !first.status.is_server_error() {
        return Ok(first);
    }

    let status = first.status.as_u16();
    let message = read_error_message(first).await;
    if !call.tools.extra.is_active() {
        tracing::warn!(status, message = %message, "upstream rejected request");
        return Err(GatewayError::UpstreamRejected { status, message });
    }

    tracing::info!(status, "upstream rejected extra tools, retrying without them");
    let retry = send(
        state,
        call,
        &call.tools.base,
        &call.tools.fallback_choice,
        &session_id,
        &headers,
    )
    .await;
    match retry {
        Ok(envelope) if !envelope.status.is_client_error() && !envelope.status.is_server_error() => {
            Ok(envelope)
        }
        Ok(envelope) => {
            tracing::warn!(status = envelope.status.as_u16(), "retry without extra tools rejected");
            Err(GatewayError::ToolsRejected {
                status: envelope.status.as_u16(),
                message,
            })
        }
        Err(err) => {
            tracing::warn!(error = %err, "retry without extra tools failed");
            Err(GatewayError::ToolsRejected { status, message })
        }
    }
}

async fn send(
    state: &AppState,
    call: &UpstreamCall<'_>,
    tools: &[ToolSpec],
    tool_choice: &ToolChoice,
    session_id: &str,
    headers: &HeaderMap,
) -> Result<UpstreamEnvelope, TransportError> {
    let payload = ResponsesPayload::new(
        call.model,
        call.instructions,
        call.input,
        tools,
        tool_choice,
        call.tools.parallel,
        call.reasoning,
        session_id,
        call.extra_fields,
    );
    let body = serde_json::to_vec(&payload)
        .map_err(|err| TransportError::Encode(err.to_string()))?;
    if state.config.features.verbose {
        tracing::debug!(
            model = call.model,
            tools = tools.len(),
            payload = %String::from_utf8_lossy(&body),
            "upstream payload"
        );
    }
    state
        .transport()
        .send(UpstreamRequest {
            headers: headers.clone(),
            body: Bytes::from(body),
        })
        .await
}

fn transport_failure(err: TransportError) -> GatewayError {
    match err {
        TransportError::Encode(message) => {
            tracing::warn!(error = %message, "failed to encode upstream payload");
            GatewayError::InvalidBody(format!("Failed to encode upstream payload: {message}"))
        }
        err => {
            tracing::warn!(error = %err, "upstream request failed");
            GatewayError::UpstreamUnreachable(err.to_string())
        }
    }
}

async fn read_error_message(envelope: UpstreamEnvelope) -> String {
    match envelope.read_to_bytes().await {
        Ok(body) => upstream_error_message(&body),
        Err(err) => {
            tracing::debug!(error = %err, "failed to read upstream error body");
            upstream_error_message(b"")
        }
    }
}

fn upstream_headers(credentials: &Credentials, session_id: &str) -> Result<HeaderMap, GatewayError> {
    let bearer = HeaderValue::from_str(&format!("Bearer {}", credentials.access_token));
    let account = HeaderValue::from_str(&credentials.account_id);
    let (Ok(bearer), Ok(account)) = (bearer, account) else {
        tracing::warn!("credentials contain characters not allowed in headers");
        return Err(GatewayError::MissingCredentials);
    };

    let mut headers = HeaderMap::with_capacity(8);
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(ACCOUNT_HEADER, account);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(BETA_HEADER, HeaderValue::from_static("responses=experimental"));
    headers.insert(ORIGINATOR_HEADER, HeaderValue::from_static("codex_cli_rs"));
    match HeaderValue::from_str(session_id) {
        Ok(value) => {
            headers.insert(SESSION_HEADER, value);
        }
        Err(_) => tracing::debug!("session id is not a valid header value, header omitted"),
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_headers() {
        let creds = Credentials {
            access_token: "tok".into(),
            account_id: "acct".into(),
        };
        let headers = upstream_headers(&creds, "sess-1").unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer tok");
        assert_eq!(headers["chatgpt-account-id"], "acct");
        assert_eq!(headers["session_id"], "sess-1");
        assert_eq!(headers[header::ACCEPT], "text/event-stream");
        assert_eq!(headers["openai-beta"], "responses=experimental");
    }

    #[test]
    fn test_encode_failure_is_not_a_connect_failure() {
        let err = transport_failure(TransportError::Encode("bad float".into()));
        assert!(matches!(&err, GatewayError::InvalidBody(msg) if msg.contains("bad float")));
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);

        let err = transport_failure(TransportError::Connect("refused".into()));
        assert!(matches!(err, GatewayError::UpstreamUnreachable(_)));
    }

    #[test]
    fn test_header_unsafe_token_counts_as_missing() {
        let creds = Credentials {
            access_token: "tok\nen".into(),
            account_id: "acct".into(),
        };
        assert!(matches!(
            upstream_headers(&creds, "s"),
            Err(GatewayError::MissingCredentials)
        ));
    }
}
