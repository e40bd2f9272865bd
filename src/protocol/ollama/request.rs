use serde_json::{json, Map, Value};

use crate::protocol::responses::serialize_tool_args;
use crate::util::next_call_id;

/// Base64 prefixes of the image formats we recognize.
const IMAGE_SIGNATURES: &[(&str, &str)] = &[
    ("/9j/", "image/jpeg"),
    ("iVBORw0KGgo", "image/png"),
    ("R0lGOD", "image/gif"),
    ("UklGR", "image/webp"),
];

/// Turn a bare base64 image payload into a data URL, sniffing the MIME type.
/// URLs and data URLs pass through unchanged.
#[must_use]
pub fn to_data_url(image: &str) -> String {
    if image.is_empty()
        || image.starts_with("data:")
        || image.starts_with("http://")
        || image.starts_with("https://")
    {
        return image.to_string();
    }
    let mime = IMAGE_SIGNATURES
        .iter()
        .find(|(prefix, _)| image.starts_with(prefix))
        .map_or("image/png", |(_, mime)| mime);
    format!("data:{mime};base64,{image}")
}

fn image_parts(images: Option<&Value>) -> Vec<Value> {
    let Some(Value::Array(images)) = images else {
        return Vec::new();
    };
    images
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|image| json!({"type": "image_url", "image_url": {"url": to_data_url(image)}}))
        .collect()
}

fn content_parts(content: Option<&Value>) -> Vec<Value> {
    match content {
        Some(Value::String(text)) if !text.is_empty() => {
            vec![json!({"type": "text", "text": text})]
        }
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                let part = part.as_object()?;
                let text = part.get("text").and_then(Value::as_str)?;
                (part.get("type").and_then(Value::as_str) == Some("text") && !text.is_empty())
                    .then(|| json!({"type": "text", "text": text}))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn convert_tool_call(call: &Value, pending: &mut Option<String>) -> Option<Value> {
    let call = call.as_object()?;
    let function = call.get("function")?.as_object()?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(other @ (Value::Object(_) | Value::Array(_))) => serialize_tool_args(other),
        _ => "{}".to_string(),
    };
    let id = match call.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        Some(id) => id.to_string(),
        None => {
            let id = next_call_id();
            *pending = Some(id.clone());
            id
        }
    };
    Some(json!({
        "id": id,
        "type": "function",
        "function": {"name": name, "arguments": arguments},
    }))
}

/// Convert Ollama chat messages into chat-completions-shaped messages.
///
/// `images` on a message become image parts; `top_images` attach to the
/// last user message (or a fresh one). Assistant tool calls without an id get
/// a generated one, which the next id-less `tool` message is linked to.
#[must_use]
pub fn convert_ollama_messages(messages: &[Value], top_images: Option<&Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(messages.len() + 1);
    let mut pending_call_id: Option<String> = None;

    for message in messages {
        let Some(obj) = message.as_object() else {
            continue;
        };
        let role = obj.get("role").and_then(Value::as_str).unwrap_or("user");

        match role {
            "assistant" => {
                let mut converted = Map::new();
                converted.insert("role".into(), Value::String("assistant".into()));
                let parts = content_parts(obj.get("content"));
                if !parts.is_empty() {
                    converted.insert("content".into(), Value::Array(parts));
                }
                if let Some(Value::Array(calls)) = obj.get("tool_calls") {
                    let calls: Vec<Value> = calls
                        .iter()
                        .filter_map(|call| convert_tool_call(call, &mut pending_call_id))
                        .collect();
                    if !calls.is_empty() {
                        converted.insert("tool_calls".into(), Value::Array(calls));
                    }
                }
                out.push(Value::Object(converted));
            }
            "tool" => {
                let explicit = ["tool_call_id", "id"].iter().find_map(|key| {
                    obj.get(*key)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                });
                let Some(call_id) = explicit.or_else(|| pending_call_id.take()) else {
                    continue;
                };
                let content = obj
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                out.push(json!({"role": "tool", "tool_call_id": call_id, "content": content}));
            }
            _ => {
                let mut parts = content_parts(obj.get("content"));
                parts.extend(image_parts(obj.get("images")));
                out.push(json!({"role": role, "content": parts}));
            }
        }
    }

    let extra = image_parts(top_images);
    if !extra.is_empty() {
        let last_user = out
            .iter_mut()
            .rev()
            .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
            .and_then(|m| m.get_mut("content"))
            .and_then(Value::as_array_mut);
        match last_user {
            Some(content) => content.extend(extra),
            None => out.push(json!({"role": "user", "content": extra})),
        }
    }
    out
}

/// Normalize Ollama tool declarations to chat-completions `function` tools.
///
/// Accepts `{"type":"function","function":{..}}`, `{"function":{..}}` and
/// flat `{"name",..}`; unnamed entries are dropped.
#[must_use]
pub fn normalize_ollama_tools(tools: Option<&Value>) -> Value {
    let Some(Value::Array(tools)) = tools else {
        return Value::Array(Vec::new());
    };
    let normalized = tools
        .iter()
        .filter_map(|tool| {
            let tool = tool.as_object()?;
            let function = match tool.get("function") {
                Some(Value::Object(function)) => function,
                _ => tool,
            };
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())?;
            let mut spec = Map::new();
            spec.insert("name".into(), Value::String(name.to_string()));
            if let Some(description) = function.get("description").and_then(Value::as_str) {
                spec.insert("description".into(), Value::String(description.to_string()));
            }
            if let Some(parameters @ Value::Object(_)) = function.get("parameters") {
                spec.insert("parameters".into(), parameters.clone());
            }
            Some(json!({"type": "function", "function": spec}))
        })
        .collect();
    Value::Array(normalized)
}
