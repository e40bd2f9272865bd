pub mod bounded_cache;
pub mod instructions;
mod models_cache;
pub mod session;

use bytes::Bytes;
use serde_json::Value;

use crate::auth::{Credentials, CredentialProvider};
use crate::config::AppConfig;
use crate::transport::UpstreamTransport;

pub use bounded_cache::BoundedCache;
pub use instructions::Instructions;
pub(crate) use models_cache::show_card;
use models_cache::ModelsCache;
pub use session::SessionCache;

pub const RESPONSE_STORE_CAPACITY: usize = 200;
pub const THREAD_STORE_CAPACITY: usize = 200;
pub const MAX_THREAD_ITEMS: usize = 40;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    upstream: UpstreamState,
    caches: CacheState,
    instructions: Instructions,
}

struct UpstreamState {
    transport: Box<dyn UpstreamTransport>,
    credentials: Box<dyn CredentialProvider>,
}

struct CacheState {
    sessions: SessionCache,
    responses: BoundedCache<String, Value>,
    threads: BoundedCache<String, Vec<Value>>,
    models: ModelsCache,
}

impl AppState {
    /// Build state with instructions read from the configured prompt files.
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: Box<dyn UpstreamTransport>,
        credentials: Box<dyn CredentialProvider>,
    ) -> Self {
        let instructions = Instructions::load(&config.instructions);
        Self::with_instructions(config, transport, credentials, instructions)
    }

    #[must_use]
    pub fn with_instructions(
        config: AppConfig,
        transport: Box<dyn UpstreamTransport>,
        credentials: Box<dyn CredentialProvider>,
        instructions: Instructions,
    ) -> Self {
        let models = ModelsCache::new(&config);
        Self {
            config,
            upstream: UpstreamState {
                transport,
                credentials,
            },
            caches: CacheState {
                sessions: SessionCache::default(),
                responses: BoundedCache::new(RESPONSE_STORE_CAPACITY),
                threads: BoundedCache::new(THREAD_STORE_CAPACITY),
                models,
            },
            instructions,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &dyn UpstreamTransport {
        self.upstream.transport.as_ref()
    }

    pub async fn credentials(&self) -> Option<Credentials> {
        self.upstream.credentials.credentials().await
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCache {
        &self.caches.sessions
    }

    #[must_use]
    pub fn instructions_for(&self, model: &str) -> &str {
        self.instructions.for_model(model)
    }

    #[must_use]
    pub fn openai_models_body(&self) -> Bytes {
        self.caches.models.openai_body()
    }

    #[must_use]
    pub fn ollama_tags_body(&self) -> Bytes {
        self.caches.models.ollama_tags_body()
    }

    /// Stored `/v1/responses` object, if one was recorded under `id`.
    #[must_use]
    pub fn stored_response(&self, id: &str) -> Option<Value> {
        self.caches.responses.get(&id.to_string())
    }

    /// Conversation items recorded for a previous response id.
    #[must_use]
    pub fn thread(&self, id: &str) -> Option<Vec<Value>> {
        self.caches.threads.get(&id.to_string())
    }

    /// Record a response and its thread. Existing entries are kept.
    pub fn store_response(&self, id: &str, response: Value, mut thread: Vec<Value>) {
        self.caches.responses.insert_if_absent(id.to_string(), response);
        if thread.len() > MAX_THREAD_ITEMS {
            thread.drain(..thread.len() - MAX_THREAD_ITEMS);
        }
        self.caches.threads.insert_if_absent(id.to_string(), thread);
    }
}
