use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Which client surface the request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngressApi {
    OpenAiChat,
    OpenAiCompletions,
    OpenAiResponses,
    Ollama,
}

/// Message role understood by the upstream. There is no system role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single content part of a canonical message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText {
        text: String,
    },
    InputImage {
        #[serde(rename = "image_url")]
        url: String,
    },
    OutputText {
        text: String,
    },
}

/// Canonical conversation item, serialized exactly as the upstream expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalItem {
    Message {
        role: MessageRole,
        #[serde(rename = "content")]
        parts: Vec<ContentPart>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

impl CanonicalItem {
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::Message {
            role: MessageRole::User,
            parts: vec![ContentPart::InputText { text: text.into() }],
        }
    }
}

/// One entry of the upstream `input` array.
///
/// Items the canonical model can describe are typed; anything else a
/// Responses-native client sends (reasoning items, refusals, ...) is relayed
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputItem {
    Canonical(CanonicalItem),
    Raw(Value),
}

impl From<CanonicalItem> for InputItem {
    fn from(item: CanonicalItem) -> Self {
        Self::Canonical(item)
    }
}

/// Built-in tool kinds the gateway lets through to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltInToolKind {
    WebSearch,
    WebSearchPreview,
}

impl BuiltInToolKind {
    #[must_use]
    pub fn from_type_str(kind: &str) -> Option<Self> {
        match kind {
            "web_search" => Some(Self::WebSearch),
            "web_search_preview" => Some(Self::WebSearchPreview),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::WebSearchPreview => "web_search_preview",
        }
    }
}

/// Canonical function tool.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Canonical tool specification.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSpec {
    Function(FunctionTool),
    BuiltIn { kind: BuiltInToolKind, raw: Value },
}

impl ToolSpec {
    #[must_use]
    pub fn default_web_search() -> Self {
        Self::BuiltIn {
            kind: BuiltInToolKind::WebSearch,
            raw: serde_json::json!({"type": "web_search"}),
        }
    }
}

impl Serialize for ToolSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolSpec::Function(tool) => {
                let mut map = serializer.serialize_map(Some(5))?;
                map.serialize_entry("type", "function")?;
                map.serialize_entry("name", &tool.name)?;
                map.serialize_entry("description", &tool.description)?;
                map.serialize_entry("strict", &false)?;
                map.serialize_entry("parameters", &tool.parameters)?;
                map.end()
            }
            ToolSpec::BuiltIn { raw, .. } => raw.serialize(serializer),
        }
    }
}

/// Tool choice forwarded upstream: `"auto"`, `"none"` or a structured object.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Specific(serde_json::Map<String, Value>),
}

impl ToolChoice {
    /// Anything that is not `"auto"`, `"none"` or an object becomes `Auto`.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if s == "none" => Self::None,
            Some(Value::Object(map)) => Self::Specific(map.clone()),
            _ => Self::Auto,
        }
    }
}

impl Serialize for ToolChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolChoice::Auto => serializer.serialize_str("auto"),
            ToolChoice::None => serializer.serialize_str("none"),
            ToolChoice::Specific(map) => map.serialize(serializer),
        }
    }
}

/// Reasoning effort levels accepted by the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
    #[serde(rename = "xhigh")]
    XHigh,
}

impl ReasoningEffort {
    pub const ALL: [ReasoningEffort; 5] = [
        ReasoningEffort::Minimal,
        ReasoningEffort::Low,
        ReasoningEffort::Medium,
        ReasoningEffort::High,
        ReasoningEffort::XHigh,
    ];

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minimal" => Some(Self::Minimal),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "xhigh" => Some(Self::XHigh),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::XHigh => "xhigh",
        }
    }
}

/// Reasoning summary verbosity. `None` means "omit the field".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummary {
    Auto,
    Concise,
    Detailed,
    None,
}

impl ReasoningSummary {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "concise" => Some(Self::Concise),
            "detailed" => Some(Self::Detailed),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_omitted(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// The `reasoning` object sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReasoningParam {
    pub effort: ReasoningEffort,
    #[serde(skip_serializing_if = "ReasoningSummary::is_omitted")]
    pub summary: ReasoningSummary,
}

/// How upstream reasoning text is made visible to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompatibilityMode {
    #[default]
    ThinkTags,
    O3,
    Legacy,
}

impl CompatibilityMode {
    /// Lenient parse: `current` is an alias of `legacy` and unknown values
    /// behave as `legacy`.
    #[must_use]
    pub fn from_config_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "think-tags" => Self::ThinkTags,
            "o3" => Self::O3,
            _ => Self::Legacy,
        }
    }
}

/// Token usage in OpenAI naming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl CanonicalUsage {
    /// Read `{input_tokens, output_tokens, total_tokens}` from an upstream
    /// usage object. A missing total is the sum of the other two.
    #[must_use]
    pub fn from_upstream(usage: &Value) -> Option<Self> {
        let usage = usage.as_object()?;
        let read = |key: &str| -> Option<u64> {
            match usage.get(key) {
                None | Some(Value::Null) => Some(0),
                Some(v) => v.as_u64().or_else(|| {
                    v.as_f64()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f as u64)
                }),
            }
        };
        let prompt_tokens = read("input_tokens")?;
        let completion_tokens = read("output_tokens")?;
        let total_tokens = match read("total_tokens")? {
            0 => prompt_tokens.saturating_add(completion_tokens),
            total => total,
        };
        Some(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    }
}
