use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::Stream;

const DEFAULT_ALLOW_HEADERS: &str = "Authorization, Content-Type, Accept, X-Session-Id";

#[inline]
fn with_content_type(status: StatusCode, body: Body, content_type: &'static str) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// 200 with a pre-serialized JSON body.
#[must_use]
pub(crate) fn json_bytes_response(body: Bytes) -> Response {
    with_content_type(StatusCode::OK, Body::from(body), "application/json")
}

/// 200 with a JSON value serialized on the spot.
#[must_use]
pub(crate) fn json_response<T: serde::Serialize>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(bytes) => json_bytes_response(Bytes::from(bytes)),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize response body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn streaming_response<S>(stream: S, content_type: &'static str) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    let mut response = with_content_type(StatusCode::OK, Body::from_stream(stream), content_type);
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

/// `text/event-stream` response over already framed SSE bytes.
pub(crate) fn sse_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    streaming_response(stream, "text/event-stream")
}

/// `application/x-ndjson` response over already framed lines.
pub(crate) fn ndjson_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    streaming_response(stream, "application/x-ndjson")
}

/// 204 answer to a CORS preflight.
#[must_use]
pub(crate) fn preflight_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Add permissive CORS headers, keeping any a handler already set.
pub(crate) fn apply_cors(response: &mut Response, request_headers: &HeaderMap) {
    let allow_headers = request_headers
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOW_HEADERS));
    let headers = response.headers_mut();
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert_with(|| HeaderValue::from_static("*"));
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_METHODS)
        .or_insert_with(|| HeaderValue::from_static("POST, GET, OPTIONS"));
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .or_insert(allow_headers);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_defaults_and_echo() {
        let mut response = preflight_response();
        apply_cors(&mut response, &HeaderMap::new());
        let headers = response.headers();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, GET, OPTIONS");
        assert!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .contains("Authorization"));

        let mut request_headers = HeaderMap::new();
        request_headers.insert(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("x-custom"),
        );
        let mut response = json_bytes_response(Bytes::from_static(b"{}"));
        apply_cors(&mut response, &request_headers);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS], "x-custom");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_sse_headers() {
        let response = sse_response(futures_util::stream::empty::<Result<Bytes, Infallible>>());
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    }
}
