pub mod validation;

use serde::{Deserialize, Serialize};

use crate::protocol::canonical::{CompatibilityMode, ReasoningEffort, ReasoningSummary};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_path: String,
    pub timeout: u64,
    pub http_pool_max_idle_per_host: usize,
    pub http_pool_idle_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_max_blocking_threads: Option<usize>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_timeout() -> u64 {
    600
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    90
}

#[derive(Debug, Deserialize)]
struct ServerConfigWire {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    base_path: String,
    #[serde(default = "default_timeout")]
    timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    http_pool_idle_timeout_secs: u64,
    #[serde(default, deserialize_with = "present_threads_setting")]
    runtime_worker_threads: Option<RuntimeThreadsSetting>,
    #[serde(default, deserialize_with = "present_threads_setting")]
    runtime_max_blocking_threads: Option<RuntimeThreadsSetting>,
}

// Keeps an explicit `null` as `Some(Auto)` instead of folding it into "missing".
fn present_threads_setting<'de, D>(deserializer: D) -> Result<Option<RuntimeThreadsSetting>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    RuntimeThreadsSetting::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuntimeThreadsSetting {
    Fixed(usize),
    Auto(()),
}

fn runtime_threads_or_default(
    setting: Option<&RuntimeThreadsSetting>,
    default: Option<usize>,
) -> Option<usize> {
    match setting {
        None => default,
        Some(RuntimeThreadsSetting::Fixed(threads)) => Some(*threads),
        Some(RuntimeThreadsSetting::Auto(())) => None,
    }
}

impl<'de> Deserialize<'de> for ServerConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = ServerConfigWire::deserialize(deserializer)?;
        Ok(Self {
            host: wire.host,
            port: wire.port,
            base_path: wire.base_path,
            timeout: wire.timeout,
            http_pool_max_idle_per_host: wire.http_pool_max_idle_per_host,
            http_pool_idle_timeout_secs: wire.http_pool_idle_timeout_secs,
            // missing => default, explicit null => auto
            runtime_worker_threads: runtime_threads_or_default(
                wire.runtime_worker_threads.as_ref(),
                None,
            ),
            runtime_max_blocking_threads: runtime_threads_or_default(
                wire.runtime_max_blocking_threads.as_ref(),
                Some(8),
            ),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: String::new(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            runtime_max_blocking_threads: Some(8),
        }
    }
}

/// Upstream Responses endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_responses_url")]
    pub responses_url: String,
}

fn default_responses_url() -> String {
    "https://chatgpt.com/backend-api/codex/responses".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            responses_url: default_responses_url(),
        }
    }
}

/// Server-side reasoning defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_effort")]
    pub effort: String,
    #[serde(default = "default_summary")]
    pub summary: String,
    #[serde(default = "default_compat")]
    pub compat: String,
}

fn default_effort() -> String {
    "medium".to_string()
}
fn default_summary() -> String {
    "auto".to_string()
}
fn default_compat() -> String {
    "think-tags".to_string()
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            effort: default_effort(),
            summary: default_summary(),
            compat: default_compat(),
        }
    }
}

impl ReasoningConfig {
    /// Configured effort; unparsable values behave as `medium`.
    #[must_use]
    pub fn effort(&self) -> ReasoningEffort {
        ReasoningEffort::parse(&self.effort).unwrap_or(ReasoningEffort::Medium)
    }

    /// Configured summary; unparsable values behave as `auto`.
    #[must_use]
    pub fn summary(&self) -> ReasoningSummary {
        ReasoningSummary::parse(&self.summary).unwrap_or(ReasoningSummary::Auto)
    }

    #[must_use]
    pub fn compat(&self) -> CompatibilityMode {
        CompatibilityMode::from_config_str(&self.compat)
    }
}

/// Base instruction prompt files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionsConfig {
    #[serde(default = "default_base_prompt_path")]
    pub base_path: String,
    #[serde(default = "default_codex_prompt_path")]
    pub codex_path: String,
}

fn default_base_prompt_path() -> String {
    "prompt.md".to_string()
}
fn default_codex_prompt_path() -> String {
    "prompt_gpt5_codex.md".to_string()
}

impl Default for InstructionsConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_prompt_path(),
            codex_path: default_codex_prompt_path(),
        }
    }
}

/// Upstream credential sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    /// Overrides the `auth.json` search list when non-empty.
    #[serde(default)]
    pub home_dirs: Vec<String>,
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub debug_model: Option<String>,
    #[serde(default)]
    pub expose_reasoning_models: bool,
    #[serde(default)]
    pub default_web_search: bool,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            verbose: false,
            debug_model: None,
            expose_reasoning_models: false,
            default_web_search: false,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub instructions: InstructionsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}
