use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::common::{apply_cors, preflight_response};
use crate::api::{health, models, ollama, openai_chat, openai_completions, openai_responses};
use crate::state::AppState;

const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
enum RouteMatch<'a> {
    Health,
    Preflight,
    Models,
    OpenAiChat,
    OpenAiCompletions,
    OpenAiResponses,
    StoredResponse { id: &'a str },
    OllamaChat,
    OllamaTags,
    OllamaShow,
    OllamaVersion,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching ingress handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path(), base_path.as_ref());
    tracing::debug!(method = %parts.method, path = parts.uri.path(), ?route, "request");

    let mut response = route_request(state, route, &parts.headers, body).await;
    apply_cors(&mut response, &parts.headers);
    Ok(response)
}

async fn route_request(
    state: Arc<AppState>,
    route: RouteMatch<'_>,
    headers: &HeaderMap,
    body: Body,
) -> Response {
    match route {
        RouteMatch::Health => health::handler(),
        RouteMatch::Preflight => preflight_response(),
        RouteMatch::Models => models::openai_models(&state),
        RouteMatch::OllamaTags => models::ollama_tags(&state),
        RouteMatch::OllamaVersion => models::ollama_version(),
        RouteMatch::StoredResponse { id } => openai_responses::retrieve(state, id).await,
        RouteMatch::OpenAiChat => match read_request_body(body).await {
            Ok(bytes) => openai_chat::handler(state, headers.clone(), bytes).await,
            Err(response) => response,
        },
        RouteMatch::OpenAiCompletions => match read_request_body(body).await {
            Ok(bytes) => openai_completions::handler(state, headers.clone(), bytes).await,
            Err(response) => response,
        },
        RouteMatch::OpenAiResponses => match read_request_body(body).await {
            Ok(bytes) => openai_responses::handler(state, headers.clone(), bytes).await,
            Err(response) => response,
        },
        RouteMatch::OllamaChat => match read_request_body(body).await {
            Ok(bytes) => ollama::handler(state, headers.clone(), bytes).await,
            Err(response) => response,
        },
        RouteMatch::OllamaShow => match read_request_body(body).await {
            Ok(bytes) => models::ollama_show(state, bytes).await,
            Err(response) => response,
        },
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

async fn read_request_body(body: Body) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES)
        .await
        .map_err(|_| {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large (max 2MiB)",
            )
                .into_response()
        })
}

fn only<'a>(method: &Method, allowed: &Method, route: RouteMatch<'a>) -> RouteMatch<'a> {
    if method == Method::OPTIONS {
        RouteMatch::Preflight
    } else if method == allowed {
        route
    } else {
        RouteMatch::MethodNotAllowed
    }
}

fn match_route<'a>(method: &Method, path: &'a str, base_path: &str) -> RouteMatch<'a> {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    match path {
        "/" | "/health" => only(method, &Method::GET, RouteMatch::Health),
        "/v1/models" => only(method, &Method::GET, RouteMatch::Models),
        "/v1/chat/completions" => only(method, &Method::POST, RouteMatch::OpenAiChat),
        "/v1/completions" => only(method, &Method::POST, RouteMatch::OpenAiCompletions),
        "/v1/responses" => only(method, &Method::POST, RouteMatch::OpenAiResponses),
        "/api/chat" => only(method, &Method::POST, RouteMatch::OllamaChat),
        "/api/tags" => only(method, &Method::GET, RouteMatch::OllamaTags),
        "/api/show" => only(method, &Method::POST, RouteMatch::OllamaShow),
        "/api/version" => only(method, &Method::GET, RouteMatch::OllamaVersion),
        _ => match path.strip_prefix("/v1/responses/") {
            Some(id) if !id.is_empty() && !id.contains('/') => {
                only(method, &Method::GET, RouteMatch::StoredResponse { id })
            }
            _ => RouteMatch::NotFound,
        },
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}
