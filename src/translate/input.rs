use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::protocol::canonical::{CanonicalItem, ContentPart, MessageRole};

/// Move the first `system` message to the front of the list as a `user`
/// message. The upstream has no system role.
pub fn relocate_system_message(messages: &mut Vec<Value>) {
    let Some(pos) = messages
        .iter()
        .position(|m| m.get("role").and_then(Value::as_str) == Some("system"))
    else {
        return;
    };
    let mut system = messages.remove(pos);
    if let Some(obj) = system.as_object_mut() {
        obj.insert("role".to_string(), Value::String("user".to_string()));
    }
    messages.insert(0, system);
}

/// Translate chat-style messages into canonical upstream items.
///
/// Messages still carrying the `system` role are skipped; call
/// [`relocate_system_message`] first to keep the leading one.
#[must_use]
pub fn convert_chat_messages(messages: &[Value]) -> Vec<CanonicalItem> {
    let mut items = Vec::with_capacity(messages.len());
    for message in messages {
        let Some(obj) = message.as_object() else {
            continue;
        };
        let role = obj.get("role").and_then(Value::as_str);
        match role {
            Some("system") => continue,
            Some("tool") => {
                if let Some(item) = convert_tool_message(obj) {
                    items.push(item);
                }
                continue;
            }
            Some("assistant") => {
                if let Some(Value::Array(calls)) = obj.get("tool_calls") {
                    items.extend(calls.iter().filter_map(convert_assistant_tool_call));
                }
            }
            _ => {}
        }

        let role = if role == Some("assistant") {
            MessageRole::Assistant
        } else {
            MessageRole::User
        };
        let parts = convert_content(obj.get("content"), role);
        if !parts.is_empty() {
            items.push(CanonicalItem::Message { role, parts });
        }
    }
    items
}

fn convert_tool_message(obj: &serde_json::Map<String, Value>) -> Option<CanonicalItem> {
    let call_id = ["tool_call_id", "id"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))?;
    let output = match obj.get("content") {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                ["text", "content"].iter().find_map(|key| {
                    part.get(*key)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                })
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(_) => return None,
    };
    Some(CanonicalItem::FunctionCallOutput {
        call_id: call_id.to_string(),
        output,
    })
}

fn convert_assistant_tool_call(call: &Value) -> Option<CanonicalItem> {
    let call = call.as_object()?;
    let kind = call.get("type").map_or(Some("function"), Value::as_str);
    if kind != Some("function") {
        return None;
    }
    let call_id = ["id", "call_id"]
        .iter()
        .find_map(|key| call.get(*key).and_then(Value::as_str))?;
    let function = call.get("function")?.as_object()?;
    let name = function.get("name")?.as_str()?;
    let arguments = function.get("arguments")?.as_str()?;
    Some(CanonicalItem::FunctionCall {
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    })
}

fn text_part(text: &str, role: MessageRole) -> ContentPart {
    match role {
        MessageRole::Assistant => ContentPart::OutputText {
            text: text.to_string(),
        },
        MessageRole::User => ContentPart::InputText {
            text: text.to_string(),
        },
    }
}

fn convert_content(content: Option<&Value>, role: MessageRole) -> Vec<ContentPart> {
    match content {
        Some(Value::String(text)) if !text.is_empty() => vec![text_part(text, role)],
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                let part = part.as_object()?;
                match part.get("type").and_then(Value::as_str)? {
                    "text" => {
                        let text = ["text", "content"].iter().find_map(|key| {
                            part.get(*key)
                                .and_then(Value::as_str)
                                .filter(|s| !s.is_empty())
                        })?;
                        Some(text_part(text, role))
                    }
                    "image_url" => {
                        let image = part.get("image_url")?;
                        let url = match image {
                            Value::String(url) => url.as_str(),
                            Value::Object(obj) => obj.get("url")?.as_str()?,
                            _ => return None,
                        };
                        (!url.is_empty()).then(|| ContentPart::InputImage {
                            url: normalize_image_data_url(url),
                        })
                    }
                    _ => None,
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Best-effort cleanup of inline base64 image data URLs: percent-decoding,
/// whitespace removal, URL-safe to standard alphabet, `=` padding.
/// Other URLs are returned unchanged.
#[must_use]
pub fn normalize_image_data_url(url: &str) -> String {
    if !url.starts_with("data:image/") {
        return url.to_string();
    }
    let Some((header, data)) = url.split_once(',') else {
        return url.to_string();
    };
    if !header.ends_with(";base64") {
        return url.to_string();
    }

    let decoded = percent_decode_str(data).decode_utf8_lossy();
    let mut cleaned: String = decoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let pad = (4 - cleaned.len() % 4) % 4;
    cleaned.extend(std::iter::repeat('=').take(pad));
    format!("{header},{cleaned}")
}
