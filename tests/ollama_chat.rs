mod support;

use axum::http::StatusCode;
use chatgate_rs::config::AppConfig;
use chatgate_rs::protocol::canonical::CompatibilityMode;
use serde_json::{json, Value};
use support::{body_bytes, body_json, ok, send, state, state_with, ScriptedTransport};

fn ndjson(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("ndjson line"))
        .collect()
}

#[tokio::test]
async fn test_stream_defaults_on_and_ends_with_done_object() {
    let transport = ScriptedTransport::new(vec![ok(&[
        json!({"type": "response.output_text.delta", "delta": "Hi"}),
        json!({"type": "response.output_text.delta", "delta": " there"}),
        json!({"type": "response.completed", "response": {"usage": {"input_tokens": 4, "output_tokens": 2}}}),
    ])]);
    let response = send(
        state(&transport),
        "POST",
        "/api/chat",
        Some(json!({"model": "gpt-5", "messages": [{"role": "user", "content": "hello"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/x-ndjson");

    let body = body_bytes(response).await;
    assert!(!String::from_utf8_lossy(&body).contains("[DONE]"));
    let lines = ndjson(&body);
    let text: String = lines
        .iter()
        .filter(|line| line["done"] == false)
        .filter_map(|line| line["message"]["content"].as_str())
        .collect();
    assert_eq!(text, "Hi there");

    let last = lines.last().expect("terminal object");
    assert_eq!(last["done"], true);
    assert_eq!(last["done_reason"], "stop");
    assert_eq!(last["prompt_eval_count"], 4);
    assert_eq!(last["eval_count"], 2);
    assert_eq!(last["model"], "gpt-5");
}

#[tokio::test]
async fn test_tool_call_emitted_with_object_arguments() {
    let transport = ScriptedTransport::new(vec![ok(&[
        json!({"type": "response.output_item.done", "item": {
            "type": "function_call", "call_id": "call_1", "name": "weather", "arguments": "{\"city\":\"Oslo\"}"
        }}),
        json!({"type": "response.completed", "response": {}}),
    ])]);
    let response = send(
        state(&transport),
        "POST",
        "/api/chat",
        Some(json!({
            "messages": [{"role": "user", "content": "weather?"}],
            "tools": [{"name": "weather", "parameters": {"type": "object"}}],
            "stream": false
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["done"], true);
    assert_eq!(
        body["message"]["tool_calls"][0]["function"],
        json!({"name": "weather", "arguments": {"city": "Oslo"}})
    );
    assert_eq!(transport.payloads()[0]["tools"][0]["name"], "weather");
}

#[tokio::test]
async fn test_non_stream_reasoning_as_thinking_in_o3_mode() {
    let mut config = AppConfig::default();
    config.reasoning.compat = "o3".to_string();
    assert_eq!(config.reasoning.compat(), CompatibilityMode::O3);
    let transport = ScriptedTransport::new(vec![ok(&[
        json!({"type": "response.reasoning_summary_text.delta", "delta": "pondering"}),
        json!({"type": "response.output_text.delta", "delta": "42"}),
        json!({"type": "response.completed", "response": {}}),
    ])]);
    let response = send(
        state_with(config, &transport),
        "POST",
        "/api/chat",
        Some(json!({"messages": [{"role": "user", "content": "q"}], "stream": false})),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["message"]["content"], "42");
    assert_eq!(body["message"]["thinking"], "pondering");
}

#[tokio::test]
async fn test_invalid_messages_use_ollama_error_shape() {
    let transport = ScriptedTransport::new(Vec::new());
    let response = send(state(&transport), "POST", "/api/chat", Some(json!({"messages": []}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Invalid request format");
    assert!(body["error"].get("type").is_none());
    assert_eq!(transport.attempts(), 0);
}
