use crate::protocol::canonical::ReasoningEffort;

/// Canonical flagship model used when the client names none.
pub const DEFAULT_MODEL: &str = "gpt-5";

const MODEL_ALIASES: &[(&str, &str)] = &[
    ("gpt5", "gpt-5"),
    ("gpt-5-latest", "gpt-5"),
    ("gpt5-codex", "gpt-5-codex"),
    ("gpt-5-codex-latest", "gpt-5-codex"),
    ("codex", "codex-mini-latest"),
    ("codex-mini", "codex-mini-latest"),
];

const EFFORT_SEPARATORS: [u8; 2] = [b'-', b'_'];

/// Resolve a client model name to the canonical upstream model id.
///
/// A non-blank `debug_model` wins unconditionally. Otherwise any `:variant`
/// tail and one trailing `-<effort>`/`_<effort>` suffix are removed before
/// the alias lookup; unknown names pass through.
#[must_use]
pub fn normalize_model_name(name: Option<&str>, debug_model: Option<&str>) -> String {
    if let Some(forced) = debug_model.map(str::trim).filter(|s| !s.is_empty()) {
        return forced.to_string();
    }
    let Some(name) = name.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_MODEL.to_string();
    };

    let base = name.split(':').next().unwrap_or(name).trim();
    let base = strip_effort_suffix(base);

    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == base)
        .map_or_else(|| base.to_string(), |(_, canonical)| (*canonical).to_string())
}

/// Split `name` into (base, effort) when it ends in `-<effort>` or `_<effort>`.
#[must_use]
pub(crate) fn split_effort_suffix(name: &str) -> Option<(&str, ReasoningEffort)> {
    let lowered = name.to_ascii_lowercase();
    for effort in ReasoningEffort::ALL {
        let word = effort.as_str();
        if lowered.len() <= word.len() || !lowered.ends_with(word) {
            continue;
        }
        let sep_at = lowered.len() - word.len() - 1;
        if EFFORT_SEPARATORS.contains(&lowered.as_bytes()[sep_at]) {
            return Some((&name[..sep_at], effort));
        }
    }
    None
}

fn strip_effort_suffix(name: &str) -> &str {
    split_effort_suffix(name).map_or(name, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_override_wins() {
        assert_eq!(
            normalize_model_name(Some("gpt-5-high"), Some("  custom-model ")),
            "custom-model"
        );
        assert_eq!(normalize_model_name(Some("gpt5"), Some("   ")), "gpt-5");
    }

    #[test]
    fn test_blank_resolves_to_flagship() {
        assert_eq!(normalize_model_name(None, None), "gpt-5");
        assert_eq!(normalize_model_name(Some("  "), None), "gpt-5");
    }

    #[test]
    fn test_effort_suffix_stripped_once() {
        assert_eq!(normalize_model_name(Some("gpt-5-medium"), None), "gpt-5");
        assert_eq!(normalize_model_name(Some("gpt-5_HIGH"), None), "gpt-5");
        assert_eq!(normalize_model_name(Some("gpt-5-xhigh"), None), "gpt-5");
        assert_eq!(normalize_model_name(Some("gpt-5-codex-low"), None), "gpt-5-codex");
        assert_eq!(
            normalize_model_name(Some("gpt-5-high-low"), None),
            "gpt-5-high"
        );
    }

    #[test]
    fn test_alias_table_and_passthrough() {
        assert_eq!(normalize_model_name(Some("gpt5"), None), "gpt-5");
        assert_eq!(normalize_model_name(Some("gpt-5-latest"), None), "gpt-5");
        assert_eq!(normalize_model_name(Some("gpt5-codex"), None), "gpt-5-codex");
        assert_eq!(normalize_model_name(Some("codex"), None), "codex-mini-latest");
        assert_eq!(
            normalize_model_name(Some("codex-mini-high"), None),
            "codex-mini-latest"
        );
        assert_eq!(normalize_model_name(Some("o4-mini"), None), "o4-mini");
    }

    #[test]
    fn test_colon_variant_is_dropped() {
        assert_eq!(normalize_model_name(Some("gpt-5:high"), None), "gpt-5");
        assert_eq!(normalize_model_name(Some("gpt5:latest"), None), "gpt-5");
    }

    #[test]
    fn test_bare_effort_word_is_not_a_suffix() {
        assert_eq!(normalize_model_name(Some("high"), None), "high");
        assert!(split_effort_suffix("gpt-5high").is_none());
    }
}
