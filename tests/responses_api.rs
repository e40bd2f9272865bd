mod support;

use axum::http::StatusCode;
use serde_json::json;
use support::{body_bytes, body_json, ok, send, state, ScriptedTransport};

#[tokio::test]
async fn test_stream_relays_upstream_bytes() {
    let events = [
        json!({"type": "response.created", "response": {"id": "resp_up"}}),
        json!({"type": "response.output_text.delta", "delta": "raw"}),
        json!({"type": "response.completed", "response": {"id": "resp_up"}}),
    ];
    let (status, upstream_body) = ok(&events);
    let transport = ScriptedTransport::new(vec![(status, upstream_body.clone())]);
    let response = send(
        state(&transport),
        "POST",
        "/v1/responses",
        Some(json!({"model": "gpt-5", "input": "hi", "temperature": 0.3, "store": true})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(body_bytes(response).await, upstream_body);

    let payload = &transport.payloads()[0];
    assert_eq!(payload["temperature"], 0.3);
    assert_eq!(payload["store"], false);
    assert_eq!(payload["input"][0]["content"][0], json!({"type": "input_text", "text": "hi"}));
}

#[tokio::test]
async fn test_store_then_retrieve_and_continue_thread() {
    let transport = ScriptedTransport::new(vec![
        ok(&[
            json!({"type": "response.output_item.done", "item": {
                "type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "first"}]
            }}),
            json!({"type": "response.completed", "response": {"usage": {"input_tokens": 2, "output_tokens": 1}}}),
        ]),
        ok(&[
            json!({"type": "response.output_text.delta", "delta": "second"}),
            json!({"type": "response.completed", "response": {}}),
        ]),
    ]);
    let state = state(&transport);

    let response = send(
        state.clone(),
        "POST",
        "/v1/responses",
        Some(json!({"input": "one", "stream": false, "store": true, "instructions": "be brief"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    let id = first["id"].as_str().expect("response id").to_string();
    assert!(id.starts_with("resp_"));
    assert_eq!(id.len(), "resp_".len() + 24);
    assert_eq!(first["object"], "response");
    assert_eq!(first["status"], "completed");
    assert_eq!(first["output"][0]["content"][0]["text"], "first");
    assert_eq!(first["usage"], json!({"input_tokens": 2, "output_tokens": 1, "total_tokens": 3}));

    let payload = &transport.payloads()[0];
    assert_eq!(payload["instructions"], "base instructions");
    assert_eq!(payload["input"][0]["content"][0]["text"], "be brief");
    assert_eq!(payload["input"][1]["content"][0]["text"], "one");

    let stored = body_json(send(state.clone(), "GET", &format!("/v1/responses/{id}"), None).await).await;
    assert_eq!(stored, first);

    let response = send(
        state.clone(),
        "POST",
        "/v1/responses",
        Some(json!({"input": "two", "stream": false, "previous_response_id": id})),
    )
    .await;
    let second = body_json(response).await;
    assert_eq!(second["output"][0]["content"][0]["text"], "second");

    let payload = &transport.payloads()[1];
    let input = payload["input"].as_array().expect("input list");
    assert_eq!(input.len(), 4);
    assert_eq!(input[2]["content"][0]["text"], "first");
    assert_eq!(input[3]["content"][0]["text"], "two");
}

#[tokio::test]
async fn test_unknown_stored_response_is_404() {
    let transport = ScriptedTransport::new(Vec::new());
    let response = send(state(&transport), "GET", "/v1/responses/resp_missing", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Response 'resp_missing' not found");
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_empty_input_and_disallowed_tool_rejected() {
    let transport = ScriptedTransport::new(Vec::new());
    let state = state(&transport);

    let response = send(state.clone(), "POST", "/v1/responses", Some(json!({"input": []}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        state,
        "POST",
        "/v1/responses",
        Some(json!({"input": "hi", "tools": [{"type": "code_interpreter"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "RESPONSES_TOOL_UNSUPPORTED");
    assert_eq!(transport.attempts(), 0);
}
