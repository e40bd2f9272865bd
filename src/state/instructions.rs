use std::path::Path;

use crate::config::InstructionsConfig;

const CODEX_MODEL: &str = "gpt-5-codex";

pub(crate) const BUILTIN_INSTRUCTIONS: &str = "You are a helpful coding assistant. \
Answer precisely, prefer concrete code over prose, and call the provided tools \
when they are the best way to make progress.";

/// Base instruction texts sent upstream as `instructions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instructions {
    base: String,
    codex: Option<String>,
}

impl Instructions {
    /// A blank codex text means "use the base text".
    #[must_use]
    pub fn new(base: impl Into<String>, codex: Option<String>) -> Self {
        Self {
            base: base.into(),
            codex: codex.filter(|text| !text.trim().is_empty()),
        }
    }

    /// Read both prompt files. A missing or blank base file falls back to a
    /// built-in text.
    #[must_use]
    pub fn load(config: &InstructionsConfig) -> Self {
        let base = read_prompt(&config.base_path).unwrap_or_else(|| {
            tracing::warn!(
                path = %config.base_path,
                "base instructions file missing or empty, using built-in instructions"
            );
            BUILTIN_INSTRUCTIONS.to_string()
        });
        let codex = read_prompt(&config.codex_path);
        if codex.is_none() {
            tracing::debug!(path = %config.codex_path, "no codex instructions, reusing base text");
        }
        Self::new(base, codex)
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Instructions for a canonical model id.
    #[must_use]
    pub fn for_model(&self, model: &str) -> &str {
        match (&self.codex, model) {
            (Some(codex), CODEX_MODEL) => codex,
            _ => &self.base,
        }
    }
}

impl Default for Instructions {
    fn default() -> Self {
        Self::new(BUILTIN_INSTRUCTIONS, None)
    }
}

fn read_prompt(path: &str) -> Option<String> {
    let text = std::fs::read_to_string(Path::new(path)).ok()?;
    (!text.trim().is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codex_text_only_for_codex_model() {
        let inst = Instructions::new("base", Some("codex".into()));
        assert_eq!(inst.for_model("gpt-5"), "base");
        assert_eq!(inst.for_model("gpt-5-codex"), "codex");
        assert_eq!(inst.for_model("codex-mini-latest"), "base");
    }

    #[test]
    fn test_blank_codex_falls_back_to_base() {
        let inst = Instructions::new("base", Some("  \n".into()));
        assert_eq!(inst.for_model("gpt-5-codex"), "base");
    }

    #[test]
    fn test_missing_files_use_builtin() {
        let config = InstructionsConfig {
            base_path: "/nonexistent/prompt.md".into(),
            codex_path: "/nonexistent/codex.md".into(),
        };
        let inst = Instructions::load(&config);
        assert_eq!(inst.base(), BUILTIN_INSTRUCTIONS);
        assert_eq!(inst.for_model("gpt-5-codex"), BUILTIN_INSTRUCTIONS);
    }
}
