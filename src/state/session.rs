use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::protocol::canonical::{CanonicalItem, ContentPart, InputItem, MessageRole};

use super::bounded_cache::BoundedCache;

pub const SESSION_CACHE_CAPACITY: usize = 10_000;

/// Storage seam for fingerprint -> session id mappings.
pub trait FingerprintStore: Send + Sync {
    /// Return the id cached for `fingerprint`, or store and return `mint()`.
    fn lookup_or_insert(&self, fingerprint: String, mint: &mut dyn FnMut() -> String) -> String;
}

impl FingerprintStore for BoundedCache<String, String> {
    fn lookup_or_insert(&self, fingerprint: String, mint: &mut dyn FnMut() -> String) -> String {
        self.get_or_insert_with(fingerprint, mint)
    }
}

/// Derives the upstream prompt-cache key for a request.
pub struct SessionCache {
    store: Box<dyn FingerprintStore>,
}

impl SessionCache {
    #[must_use]
    pub fn new(store: Box<dyn FingerprintStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Box::new(BoundedCache::<String, String>::new(capacity)))
    }

    /// A non-blank client id wins and is never cached. Otherwise the id is
    /// keyed by the fingerprint of the instructions and the first user
    /// message, so later turns of one conversation map to the same id.
    pub fn ensure_session_id(
        &self,
        instructions: Option<&str>,
        items: &[InputItem],
        client_supplied: Option<&str>,
    ) -> String {
        if let Some(id) = client_supplied.map(str::trim).filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        let fingerprint = fingerprint(&canonicalize_prefix(instructions, items));
        self.store
            .lookup_or_insert(fingerprint, &mut || uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::with_capacity(SESSION_CACHE_CAPACITY)
    }
}

// Field order is alphabetical so the derived serializer emits sorted keys.
#[derive(Serialize)]
struct CanonicalPrefix<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_user_message: Option<FirstUserMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

#[derive(Serialize)]
struct FirstUserMessage<'a> {
    content: Vec<NormalizedPart<'a>>,
    role: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum NormalizedPart<'a> {
    Text {
        text: &'a str,
        #[serde(rename = "type")]
        kind: &'static str,
    },
    Image {
        image_url: &'a str,
        #[serde(rename = "type")]
        kind: &'static str,
    },
}

fn first_user_message(items: &[InputItem]) -> Option<FirstUserMessage<'_>> {
    items.iter().find_map(|item| {
        let InputItem::Canonical(CanonicalItem::Message {
            role: MessageRole::User,
            parts,
        }) = item
        else {
            return None;
        };
        let content: Vec<NormalizedPart<'_>> = parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::InputText { text } if !text.is_empty() => Some(NormalizedPart::Text {
                    text,
                    kind: "input_text",
                }),
                ContentPart::InputImage { url } if !url.is_empty() => Some(NormalizedPart::Image {
                    image_url: url,
                    kind: "input_image",
                }),
                _ => None,
            })
            .collect();
        (!content.is_empty()).then_some(FirstUserMessage {
            content,
            role: "user",
            kind: "message",
        })
    })
}

/// Deterministic, key-sorted, compact serialization of the request prefix.
#[must_use]
pub fn canonicalize_prefix(instructions: Option<&str>, items: &[InputItem]) -> String {
    let prefix = CanonicalPrefix {
        first_user_message: first_user_message(items),
        instructions: instructions.map(str::trim).filter(|s| !s.is_empty()),
    };
    serde_json::to_string(&prefix).unwrap_or_default()
}

/// Hex SHA-256 of the canonical prefix.
#[must_use]
pub fn fingerprint(canonical: &str) -> String {
    hex::encode(Sha256::digest(canonical.as_bytes()))
}
