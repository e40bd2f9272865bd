use bytes::Bytes;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::AppConfig;

/// Base models and the effort variants they advertise.
const MODEL_GROUPS: &[(&str, &[&str])] = &[
    ("gpt-5", &["high", "medium", "low", "minimal"]),
    ("gpt-5-codex", &["high", "medium", "low"]),
    ("codex-mini", &[]),
];

const OWNER: &str = "owner";
const MODIFIED_AT: &str = "2023-10-01T00:00:00Z";
const FAKE_SIZE: u64 = 815_319_791;

/// Model listings serialized once at startup.
#[derive(Debug, Clone)]
pub(crate) struct ModelsCache {
    openai_body: Bytes,
    ollama_tags_body: Bytes,
}

impl ModelsCache {
    #[must_use]
    pub(crate) fn new(config: &AppConfig) -> Self {
        let ids = visible_model_ids(config.features.expose_reasoning_models);
        Self {
            openai_body: Bytes::from(openai_models_body(&ids).to_string()),
            ollama_tags_body: Bytes::from(ollama_tags_body(&ids).to_string()),
        }
    }

    #[must_use]
    pub(crate) fn openai_body(&self) -> Bytes {
        self.openai_body.clone()
    }

    #[must_use]
    pub(crate) fn ollama_tags_body(&self) -> Bytes {
        self.ollama_tags_body.clone()
    }
}

pub(crate) fn visible_model_ids(expose_variants: bool) -> Vec<String> {
    let mut ids = Vec::new();
    for (base, efforts) in MODEL_GROUPS {
        ids.push((*base).to_string());
        if expose_variants {
            ids.extend(efforts.iter().map(|effort| format!("{base}-{effort}")));
        }
    }
    ids
}

fn openai_models_body(ids: &[String]) -> Value {
    let data: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "object": "model", "owned_by": OWNER}))
        .collect();
    json!({"object": "list", "data": data})
}

fn model_details() -> Value {
    json!({
        "parent_model": "",
        "format": "gguf",
        "family": "llama",
        "families": ["llama"],
        "parameter_size": "8.0B",
        "quantization_level": "Q4_0",
    })
}

fn ollama_tags_body(ids: &[String]) -> Value {
    let models: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "name": id,
                "model": id,
                "modified_at": MODIFIED_AT,
                "size": FAKE_SIZE,
                "digest": hex::encode(Sha256::digest(id.as_bytes())),
                "details": model_details(),
            })
        })
        .collect();
    json!({"models": models})
}

/// Static `/api/show` card for `model`.
#[must_use]
pub(crate) fn show_card(model: &str) -> Value {
    json!({
        "modelfile": format!("FROM {model}\n"),
        "parameters": "",
        "template": "{{ .Prompt }}",
        "details": model_details(),
        "model_info": {
            "general.architecture": "llama",
            "general.basename": model,
            "general.parameter_count": 8_000_000_000u64,
            "llama.context_length": 272_000,
        },
        "capabilities": ["completion", "tools", "thinking"],
        "modified_at": MODIFIED_AT,
    })
}
