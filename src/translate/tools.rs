use serde_json::Value;

use crate::error::GatewayError;
use crate::protocol::canonical::{BuiltInToolKind, FunctionTool, ToolSpec};

/// Upper bound on the serialized size of the extra (built-in) tool list.
pub const MAX_EXTRA_TOOLS_BYTES: usize = 32_768;

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

fn function_tool_from(function: &serde_json::Map<String, Value>) -> Option<ToolSpec> {
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;
    let description = function
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let parameters = match function.get("parameters") {
        Some(params @ Value::Object(_)) => params.clone(),
        _ => empty_object_schema(),
    };
    Some(ToolSpec::Function(FunctionTool {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }))
}

/// Map OpenAI chat `tools` (`{"type":"function","function":{...}}`) to
/// canonical function tools. Unnamed and non-function entries are dropped.
#[must_use]
pub fn convert_function_tools(tools: Option<&Value>) -> Vec<ToolSpec> {
    let Some(Value::Array(tools)) = tools else {
        return Vec::new();
    };
    tools
        .iter()
        .filter_map(|tool| {
            let tool = tool.as_object()?;
            if tool.get("type").and_then(Value::as_str) != Some("function") {
                return None;
            }
            function_tool_from(tool.get("function")?.as_object()?)
        })
        .collect()
}

/// Map a Responses-native `tools` list: nested or flat function tools plus
/// allow-listed built-ins. Any other typed tool rejects the request.
///
/// # Errors
///
/// Returns [`GatewayError::UnsupportedTool`] for tool types outside the allow-list.
pub fn convert_responses_tools(tools: Option<&Value>) -> Result<Vec<ToolSpec>, GatewayError> {
    let Some(Value::Array(tools)) = tools else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(tools.len());
    for tool in tools {
        let Some(obj) = tool.as_object() else {
            continue;
        };
        let Some(kind) = obj.get("type").and_then(Value::as_str) else {
            continue;
        };
        if kind == "function" {
            let spec = match obj.get("function") {
                Some(Value::Object(function)) => function_tool_from(function),
                _ => function_tool_from(obj),
            };
            out.extend(spec);
            continue;
        }
        out.push(built_in_tool(kind, tool)?);
    }
    Ok(out)
}

fn built_in_tool(kind: &str, raw: &Value) -> Result<ToolSpec, GatewayError> {
    BuiltInToolKind::from_type_str(kind)
        .map(|kind| ToolSpec::BuiltIn {
            kind,
            raw: raw.clone(),
        })
        .ok_or_else(|| {
            GatewayError::UnsupportedTool(
                "Only web_search/web_search_preview are supported in responses_tools".to_string(),
            )
        })
}

/// Result of policing the client's extra built-in tool channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraTools {
    pub tools: Vec<ToolSpec>,
}

impl ExtraTools {
    /// True when extra tools will be sent, which arms the single retry
    /// without them.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Police `responses_tools` and apply the default web-search injection.
///
/// Entries that are not objects with a string `type` are skipped. A single
/// entry outside the allow-list, or an oversized list, rejects the whole
/// request.
///
/// # Errors
///
/// Returns [`GatewayError::UnsupportedTool`] or [`GatewayError::ToolsTooLarge`].
pub fn resolve_extra_tools(
    responses_tools: Option<&Value>,
    responses_tool_choice: Option<&Value>,
    default_web_search: bool,
) -> Result<ExtraTools, GatewayError> {
    let mut tools = Vec::new();
    if let Some(Value::Array(entries)) = responses_tools {
        for entry in entries {
            let Some(kind) = entry.get("type").and_then(Value::as_str) else {
                continue;
            };
            tools.push(built_in_tool(kind, entry)?);
        }
    }

    let explicitly_disabled = responses_tool_choice.and_then(Value::as_str) == Some("none");
    if tools.is_empty() && default_web_search && !explicitly_disabled {
        tools.push(ToolSpec::default_web_search());
    }

    if !tools.is_empty() {
        let size = serde_json::to_vec(&tools).map_or(usize::MAX, |bytes| bytes.len());
        if size > MAX_EXTRA_TOOLS_BYTES {
            return Err(GatewayError::ToolsTooLarge(
                "responses_tools too large".to_string(),
            ));
        }
    }

    Ok(ExtraTools { tools })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_tools_defaults() {
        let tools = convert_function_tools(Some(&json!([
            {"type": "function", "function": {"name": "a", "description": "d", "parameters": {"type": "object"}}},
            {"type": "function", "function": {"name": "b", "parameters": "bad"}},
            {"type": "function", "function": {"name": ""}},
            {"type": "retrieval"},
            "junk"
        ])));
        assert_eq!(tools.len(), 2);
        assert_eq!(
            serde_json::to_value(&tools[1]).unwrap(),
            json!({
                "type": "function",
                "name": "b",
                "description": "",
                "strict": false,
                "parameters": {"type": "object", "properties": {}}
            })
        );
        assert!(convert_function_tools(Some(&json!({"not": "a list"}))).is_empty());
        assert!(convert_function_tools(None).is_empty());
    }

    #[test]
    fn test_unsupported_extra_tool_rejects_request() {
        let err = resolve_extra_tools(
            Some(&json!([{"type": "web_search"}, {"type": "not_supported"}])),
            None,
            false,
        )
        .unwrap_err();
        assert_eq!(err.code(), "RESPONSES_TOOL_UNSUPPORTED");
    }

    #[test]
    fn test_untyped_extra_entries_skipped() {
        let extra =
            resolve_extra_tools(Some(&json!(["x", {"type": 3}, {}])), None, false).unwrap();
        assert!(!extra.is_active());
    }

    #[test]
    fn test_default_web_search_injection() {
        let extra = resolve_extra_tools(None, None, true).unwrap();
        assert_eq!(extra.tools, vec![ToolSpec::default_web_search()]);

        let extra = resolve_extra_tools(None, Some(&json!("none")), true).unwrap();
        assert!(!extra.is_active());

        let extra = resolve_extra_tools(
            Some(&json!([{"type": "web_search_preview"}])),
            None,
            true,
        )
        .unwrap();
        assert_eq!(extra.tools.len(), 1);
        assert!(matches!(
            extra.tools[0],
            ToolSpec::BuiltIn {
                kind: BuiltInToolKind::WebSearchPreview,
                ..
            }
        ));
    }

    #[test]
    fn test_oversized_extra_tools_rejected() {
        let huge = "x".repeat(MAX_EXTRA_TOOLS_BYTES);
        let err = resolve_extra_tools(
            Some(&json!([{"type": "web_search", "note": huge}])),
            None,
            false,
        )
        .unwrap_err();
        assert_eq!(err.code(), "RESPONSES_TOOLS_TOO_LARGE");
    }

    #[test]
    fn test_responses_native_tools() {
        let tools = convert_responses_tools(Some(&json!([
            {"type": "function", "name": "flat", "parameters": {"type": "object"}},
            {"type": "function", "function": {"name": "nested"}},
            {"type": "web_search"}
        ])))
        .unwrap();
        assert_eq!(tools.len(), 3);
        assert!(convert_responses_tools(Some(&json!([{"type": "file_search"}]))).is_err());
    }
}
