use serde_json::Value;

use crate::protocol::canonical::{
    CompatibilityMode, ReasoningEffort, ReasoningParam, ReasoningSummary,
};

use super::model::split_effort_suffix;

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// Raw, unvalidated reasoning overrides from a request or a model name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasoningOverrides {
    pub effort: Option<String>,
    pub summary: Option<String>,
}

impl ReasoningOverrides {
    /// Read a request-level `reasoning` object. Non-objects yield `None`.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        let map = value?.as_object()?;
        let field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            effort: field("effort"),
            summary: field("summary"),
        })
    }
}

/// Parse an effort hint out of a requested model name such as
/// `gpt-5:high`, `gpt-5-high` or `gpt-5_low`.
#[must_use]
pub fn extract_reasoning_from_model_name(model: Option<&str>) -> Option<ReasoningOverrides> {
    let lowered = model?.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let effort = if let Some((_, tail)) = lowered.split_once(':') {
        ReasoningEffort::parse(tail)?
    } else {
        split_effort_suffix(&lowered)?.1
    };

    Some(ReasoningOverrides {
        effort: Some(effort.as_str().to_string()),
        summary: None,
    })
}

/// Compute the upstream `reasoning` object.
///
/// Overrides win field by field when they hold a valid value; anything else
/// silently falls back to the server defaults.
#[must_use]
pub fn build_reasoning_param(
    default_effort: ReasoningEffort,
    default_summary: ReasoningSummary,
    overrides: Option<&ReasoningOverrides>,
) -> ReasoningParam {
    let effort = overrides
        .and_then(|o| o.effort.as_deref())
        .and_then(ReasoningEffort::parse)
        .unwrap_or(default_effort);
    let summary = overrides
        .and_then(|o| o.summary.as_deref())
        .and_then(ReasoningSummary::parse)
        .unwrap_or(default_summary);
    ReasoningParam { effort, summary }
}

/// How fully aggregated reasoning text is attached to a one-shot response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasoningView {
    Hidden,
    /// Prepend `<think>text</think>` to the visible content.
    ThinkTags(String),
    /// Separate structured reasoning field.
    Structured(String),
    /// Two flat fields; empty ones are omitted.
    Flat {
        summary: Option<String>,
        full: Option<String>,
    },
}

impl ReasoningView {
    /// Prefix `content` with the think block when this view calls for it.
    #[must_use]
    pub fn wrap_content(&self, content: &str) -> Option<String> {
        match self {
            ReasoningView::ThinkTags(reasoning) => Some(format!(
                "{THINK_OPEN}{reasoning}{THINK_CLOSE}{content}"
            )),
            _ => None,
        }
    }
}

/// Pick the reasoning presentation for a non-streamed response.
#[must_use]
pub fn reasoning_view(summary: &str, full: &str, compat: CompatibilityMode) -> ReasoningView {
    match compat {
        CompatibilityMode::ThinkTags | CompatibilityMode::O3 => {
            let joined = [summary, full]
                .into_iter()
                .filter(|part| !part.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
            if joined.is_empty() {
                ReasoningView::Hidden
            } else if compat == CompatibilityMode::ThinkTags {
                ReasoningView::ThinkTags(joined)
            } else {
                ReasoningView::Structured(joined)
            }
        }
        CompatibilityMode::Legacy => {
            let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
            let summary = non_empty(summary);
            let full = non_empty(full);
            if summary.is_none() && full.is_none() {
                ReasoningView::Hidden
            } else {
                ReasoningView::Flat { summary, full }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(effort: &str, summary: &str) -> ReasoningOverrides {
        ReasoningOverrides {
            effort: Some(effort.into()),
            summary: Some(summary.into()),
        }
    }

    #[test]
    fn test_model_name_effort_hints() {
        let hint = |m: &str| extract_reasoning_from_model_name(Some(m)).and_then(|o| o.effort);
        assert_eq!(hint("gpt-5:high").as_deref(), Some("high"));
        assert_eq!(hint("GPT-5-Minimal").as_deref(), Some("minimal"));
        assert_eq!(hint("gpt-5_low").as_deref(), Some("low"));
        assert_eq!(hint("gpt-5-xhigh").as_deref(), Some("xhigh"));
        assert_eq!(hint("gpt-5:weird"), None);
        assert_eq!(hint("gpt-5"), None);
        assert!(extract_reasoning_from_model_name(None).is_none());
    }

    #[test]
    fn test_invalid_overrides_fall_back_to_defaults() {
        let param = build_reasoning_param(
            ReasoningEffort::Medium,
            ReasoningSummary::Auto,
            Some(&overrides("bogus", "nope")),
        );
        assert_eq!(param.effort, ReasoningEffort::Medium);
        assert_eq!(param.summary, ReasoningSummary::Auto);
    }

    #[test]
    fn test_summary_none_override_omits_field() {
        let param = build_reasoning_param(
            ReasoningEffort::Medium,
            ReasoningSummary::Auto,
            Some(&overrides("bogus", "none")),
        );
        assert_eq!(
            serde_json::to_value(param).unwrap(),
            json!({"effort": "medium"})
        );
    }

    #[test]
    fn test_valid_overrides_win() {
        let param = build_reasoning_param(
            ReasoningEffort::Low,
            ReasoningSummary::Auto,
            Some(&overrides("HIGH", "detailed")),
        );
        assert_eq!(param.effort, ReasoningEffort::High);
        assert_eq!(param.summary, ReasoningSummary::Detailed);
    }

    #[test]
    fn test_overrides_from_request_object() {
        assert!(ReasoningOverrides::from_value(Some(&json!("high"))).is_none());
        let parsed = ReasoningOverrides::from_value(Some(&json!({"effort": "low", "summary": 3})))
            .unwrap();
        assert_eq!(parsed.effort.as_deref(), Some("low"));
        assert_eq!(parsed.summary, None);
    }

    #[test]
    fn test_reasoning_views() {
        assert_eq!(
            reasoning_view("sum", "full", CompatibilityMode::ThinkTags),
            ReasoningView::ThinkTags("sum\n\nfull".into())
        );
        assert_eq!(
            reasoning_view("  ", "full", CompatibilityMode::O3),
            ReasoningView::Structured("full".into())
        );
        assert_eq!(
            reasoning_view("", "", CompatibilityMode::O3),
            ReasoningView::Hidden
        );
        assert_eq!(
            reasoning_view("s", "", CompatibilityMode::Legacy),
            ReasoningView::Flat {
                summary: Some("s".into()),
                full: None
            }
        );
        let view = reasoning_view("r", "", CompatibilityMode::ThinkTags);
        assert_eq!(view.wrap_content("hi").as_deref(), Some("<think>r</think>hi"));
    }
}
