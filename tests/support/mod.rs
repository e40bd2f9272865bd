#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use chatgate_rs::auth::StaticCredentials;
use chatgate_rs::config::AppConfig;
use chatgate_rs::routing::dispatch_request;
use chatgate_rs::state::{AppState, Instructions};
use chatgate_rs::transport::{TransportError, UpstreamEnvelope, UpstreamRequest, UpstreamTransport};
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Default)]
struct Script {
    replies: Mutex<VecDeque<(StatusCode, Bytes)>>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

/// Replays canned upstream replies in order and records every dispatched
/// request. Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Script>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<(StatusCode, Bytes)>) -> Self {
        let transport = Self::default();
        transport.script.replies.lock().extend(replies);
        transport
    }

    pub fn attempts(&self) -> usize {
        self.script.requests.lock().len()
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.script
            .requests
            .lock()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).expect("payload json"))
            .collect()
    }

    pub fn last_headers(&self) -> Option<axum::http::HeaderMap> {
        self.script
            .requests
            .lock()
            .last()
            .map(|request| request.headers.clone())
    }
}

#[async_trait::async_trait]
impl UpstreamTransport for ScriptedTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamEnvelope, TransportError> {
        self.script.requests.lock().push(request);
        let reply = self.script.replies.lock().pop_front();
        match reply {
            Some((status, body)) => Ok(UpstreamEnvelope::from_bytes(status, body)),
            None => Err(TransportError::Connect("no scripted reply left".into())),
        }
    }
}

/// SSE body with one `data:` frame per event.
pub fn sse(events: &[Value]) -> Bytes {
    let mut out = String::new();
    for event in events {
        out.push_str("data: ");
        out.push_str(&event.to_string());
        out.push_str("\n\n");
    }
    Bytes::from(out)
}

pub fn ok(events: &[Value]) -> (StatusCode, Bytes) {
    (StatusCode::OK, sse(events))
}

pub fn state_with(config: AppConfig, transport: &ScriptedTransport) -> Arc<AppState> {
    Arc::new(AppState::with_instructions(
        config,
        Box::new(transport.clone()),
        Box::new(StaticCredentials::new("token", "account")),
        Instructions::new("base instructions", Some("codex instructions".into())),
    ))
}

pub fn state(transport: &ScriptedTransport) -> Arc<AppState> {
    state_with(AppConfig::default(), transport)
}

pub async fn send(state: Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> Response {
    let body = body.map_or_else(Body::empty, |body| Body::from(body.to_string()));
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .expect("build request");
    dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch")
}

pub async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body")
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

/// JSON payloads of the `data:` lines of an SSE body, `[DONE]` excluded.
pub fn sse_payloads(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter(|data| *data != "[DONE]")
        .map(|data| serde_json::from_str(data).expect("sse json"))
        .collect()
}
