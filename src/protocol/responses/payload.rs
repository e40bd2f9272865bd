use serde::Serialize;
use serde_json::{Map, Value};

use crate::protocol::canonical::{InputItem, ReasoningParam, ToolChoice, ToolSpec};

const ENCRYPTED_REASONING_INCLUDE: &str = "reasoning.encrypted_content";

/// Body of one upstream `POST /responses` call.
///
/// `store` and `stream` are fixed: the upstream only serves streamed,
/// non-persisted responses.
#[derive(Debug, Serialize)]
pub struct ResponsesPayload<'a> {
    pub model: &'a str,
    pub instructions: &'a str,
    pub input: &'a [InputItem],
    pub tools: &'a [ToolSpec],
    pub tool_choice: &'a ToolChoice,
    pub parallel_tool_calls: bool,
    store: bool,
    stream: bool,
    pub prompt_cache_key: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningParam>,
    #[serde(flatten)]
    pub extra: &'a Map<String, Value>,
}

impl<'a> ResponsesPayload<'a> {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        model: &'a str,
        instructions: &'a str,
        input: &'a [InputItem],
        tools: &'a [ToolSpec],
        tool_choice: &'a ToolChoice,
        parallel_tool_calls: bool,
        reasoning: Option<ReasoningParam>,
        prompt_cache_key: &'a str,
        extra: &'a Map<String, Value>,
    ) -> Self {
        // A client-supplied `include` replaces ours.
        let include = if reasoning.is_some() && !extra.contains_key("include") {
            vec![ENCRYPTED_REASONING_INCLUDE]
        } else {
            Vec::new()
        };
        Self {
            model,
            instructions,
            input,
            tools,
            tool_choice,
            parallel_tool_calls,
            store: false,
            stream: true,
            prompt_cache_key,
            include,
            reasoning,
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::canonical::{CanonicalItem, ReasoningEffort, ReasoningSummary};
    use serde_json::json;

    #[test]
    fn test_payload_forces_stream_and_no_store() {
        let input = vec![InputItem::from(CanonicalItem::user_text("hi"))];
        let mut extra = Map::new();
        extra.insert("temperature".into(), json!(0.2));
        let payload = ResponsesPayload::new(
            "gpt-5",
            "be nice",
            &input,
            &[],
            &ToolChoice::Auto,
            false,
            Some(ReasoningParam {
                effort: ReasoningEffort::Low,
                summary: ReasoningSummary::Auto,
            }),
            "sess-1",
            &extra,
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["store"], json!(false));
        assert_eq!(value["stream"], json!(true));
        assert_eq!(value["tool_choice"], json!("auto"));
        assert_eq!(value["prompt_cache_key"], json!("sess-1"));
        assert_eq!(value["include"], json!(["reasoning.encrypted_content"]));
        assert_eq!(value["reasoning"], json!({"effort": "low", "summary": "auto"}));
        assert_eq!(value["temperature"], json!(0.2));
        assert_eq!(value["input"][0]["content"][0]["text"], json!("hi"));
    }

    #[test]
    fn test_include_omitted_without_reasoning() {
        let extra = Map::new();
        let payload = ResponsesPayload::new(
            "gpt-5",
            "",
            &[],
            &[],
            &ToolChoice::None,
            true,
            None,
            "k",
            &extra,
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("include").is_none());
        assert!(value.get("reasoning").is_none());
        assert_eq!(value["tools"], json!([]));
        assert_eq!(value["parallel_tool_calls"], json!(true));
    }
}
