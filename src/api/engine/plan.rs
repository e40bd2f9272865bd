use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::policy::{
    build_reasoning_param, extract_reasoning_from_model_name, normalize_model_name,
    ReasoningOverrides,
};
use crate::protocol::canonical::{ReasoningParam, ToolChoice, ToolSpec};
use crate::state::AppState;
use crate::translate::{resolve_extra_tools, ExtraTools};

use crate::api::common::{bool_field, str_field};

/// Requested model string plus the canonical upstream id it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelChoice {
    pub(crate) requested: Option<String>,
    pub(crate) model: String,
}

impl ModelChoice {
    pub(crate) fn resolve(state: &AppState, payload: &Map<String, Value>) -> Self {
        let requested = str_field(payload, "model")
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        let model = normalize_model_name(
            requested.as_deref(),
            state.config.features.debug_model.as_deref(),
        );
        tracing::debug!(requested = ?requested, model = %model, "model mapped");
        Self { requested, model }
    }

    /// Model name echoed back to the client.
    pub(crate) fn echo(&self) -> &str {
        self.requested.as_deref().unwrap_or(&self.model)
    }
}

/// Reasoning parameters: the request's `reasoning` object wins over an effort
/// suffix on the requested model name, which wins over server defaults.
pub(crate) fn reasoning_for(
    state: &AppState,
    payload: &Map<String, Value>,
    requested_model: Option<&str>,
) -> ReasoningParam {
    let overrides = ReasoningOverrides::from_value(payload.get("reasoning"))
        .or_else(|| extract_reasoning_from_model_name(requested_model));
    let defaults = &state.config.reasoning;
    build_reasoning_param(defaults.effort(), defaults.summary(), overrides.as_ref())
}

/// Tools for one request, including what the single retry falls back to.
#[derive(Debug, Clone, Default)]
pub(crate) struct ToolPlan {
    pub(crate) base: Vec<ToolSpec>,
    pub(crate) extra: ExtraTools,
    pub(crate) choice: ToolChoice,
    /// Tool choice of the retry without extra tools: the client's own
    /// `tool_choice`, ignoring any `responses_tool_choice` override.
    pub(crate) fallback_choice: ToolChoice,
    pub(crate) parallel: bool,
}

impl ToolPlan {
    /// Combine `base` tools with the policed `responses_tools` channel.
    ///
    /// # Errors
    ///
    /// Propagates [`resolve_extra_tools`] rejections.
    pub(crate) fn from_payload(
        state: &AppState,
        base: Vec<ToolSpec>,
        payload: &Map<String, Value>,
    ) -> Result<Self, GatewayError> {
        let responses_tool_choice = payload.get("responses_tool_choice");
        let extra = resolve_extra_tools(
            payload.get("responses_tools"),
            responses_tool_choice,
            state.config.features.default_web_search,
        )?;

        let fallback_choice = ToolChoice::from_value(payload.get("tool_choice"));
        let choice = match responses_tool_choice.and_then(Value::as_str) {
            Some("auto") => ToolChoice::Auto,
            Some("none") => ToolChoice::None,
            _ => fallback_choice.clone(),
        };

        Ok(Self {
            base,
            extra,
            choice,
            fallback_choice,
            parallel: bool_field(payload, "parallel_tool_calls", false),
        })
    }

    /// Base tools followed by the extra built-ins.
    pub(crate) fn first_attempt_tools(&self) -> Vec<ToolSpec> {
        let mut tools = Vec::with_capacity(self.base.len() + self.extra.tools.len());
        tools.extend(self.base.iter().cloned());
        tools.extend(self.extra.tools.iter().cloned());
        tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;
    use crate::config::AppConfig;
    use crate::protocol::canonical::{ReasoningEffort, ReasoningSummary};
    use crate::state::Instructions;
    use crate::transport::{TransportError, UpstreamEnvelope, UpstreamRequest, UpstreamTransport};
    use serde_json::json;

    struct Offline;

    #[async_trait::async_trait]
    impl UpstreamTransport for Offline {
        async fn send(&self, _: UpstreamRequest) -> Result<UpstreamEnvelope, TransportError> {
            Err(TransportError::Connect("offline".into()))
        }
    }

    fn state_with(config: AppConfig) -> AppState {
        AppState::with_instructions(
            config,
            Box::new(Offline),
            Box::new(StaticCredentials::absent()),
            Instructions::default(),
        )
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_model_choice_echoes_requested_name() {
        let state = state_with(AppConfig::default());
        let choice = ModelChoice::resolve(&state, &object(json!({"model": "gpt5-high"})));
        assert_eq!(choice.model, "gpt-5");
        assert_eq!(choice.echo(), "gpt5-high");

        let choice = ModelChoice::resolve(&state, &object(json!({})));
        assert_eq!(choice.echo(), "gpt-5");
    }

    #[test]
    fn test_reasoning_object_beats_model_suffix() {
        let state = state_with(AppConfig::default());
        let payload = object(json!({"reasoning": {"effort": "low"}}));
        let param = reasoning_for(&state, &payload, Some("gpt-5-high"));
        assert_eq!(param.effort, ReasoningEffort::Low);
        assert_eq!(param.summary, ReasoningSummary::Auto);

        let param = reasoning_for(&state, &Map::new(), Some("gpt-5-high"));
        assert_eq!(param.effort, ReasoningEffort::High);
    }

    #[test]
    fn test_responses_tool_choice_override_keeps_fallback() {
        let state = state_with(AppConfig::default());
        let payload = object(json!({
            "tool_choice": "none",
            "responses_tool_choice": "auto",
            "responses_tools": [{"type": "web_search"}],
            "parallel_tool_calls": true
        }));
        let plan = ToolPlan::from_payload(&state, Vec::new(), &payload).unwrap();
        assert_eq!(plan.choice, ToolChoice::Auto);
        assert_eq!(plan.fallback_choice, ToolChoice::None);
        assert!(plan.extra.is_active());
        assert!(plan.parallel);
        assert_eq!(plan.first_attempt_tools().len(), 1);
    }
}
