use std::time::Instant;

use crate::protocol::canonical::CanonicalUsage;
use tracing_subscriber::EnvFilter;

/// Map a configured log level onto a tracing filter directive.
///
/// Returns `None` for `DISABLED`.
#[must_use]
pub fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.trim().to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Initialize the tracing subscriber with the configured log level.
///
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - unparsable levels fall back to INFO
pub fn init_tracing(log_level: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Log token usage for a completed request, computing duration from start time.
pub fn log_request_complete(model: &str, usage: &CanonicalUsage, start_time: Instant) {
    tracing::info!(
        model = model,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        duration_seconds = start_time.elapsed().as_secs_f64(),
        "request completed"
    );
}

/// Per-request bookkeeping carried until the response is fully produced.
#[derive(Debug, Clone)]
pub struct RequestLog {
    pub model: String,
    pub started: Instant,
}

impl RequestLog {
    #[must_use]
    pub fn start(model: &str) -> Self {
        Self {
            model: model.to_string(),
            started: Instant::now(),
        }
    }

    /// Emit the completion record when the upstream reported usage.
    pub fn finish(&self, usage: Option<&CanonicalUsage>) {
        if let Some(usage) = usage {
            log_request_complete(&self.model, usage, self.started);
        }
    }
}
