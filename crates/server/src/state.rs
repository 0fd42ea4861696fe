//! Application state shared across handlers.

use crate::coordinator::Coordinator;
use crate::executor::Executor;
use runlet_core::config::AppConfig;
use runlet_metadata::MetadataStore;
use runlet_sandbox::{CompiledHandler, HandlerCache, SandboxEngine};
use runlet_storage::BlobStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Blob store holding script content and env.
    pub storage: Arc<dyn BlobStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Compiled handler cache, shared by the coordinator and the executor.
    pub cache: Arc<HandlerCache<CompiledHandler>>,
    pub coordinator: Arc<Coordinator>,
    pub executor: Arc<Executor>,
}

impl AppState {
    /// Wire the coordinator and executor around one handler cache.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        engine: SandboxEngine,
    ) -> Self {
        let cache = Arc::new(HandlerCache::new(
            config.cache.max_entries,
            config.cache.ttl(),
        ));
        let coordinator = Arc::new(Coordinator::new(
            storage.clone(),
            metadata.clone(),
            cache.clone(),
        ));
        let executor = Arc::new(Executor::new(coordinator.clone(), engine, cache.clone()));

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            cache,
            coordinator,
            executor,
        }
    }
}
