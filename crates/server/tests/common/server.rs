//! Server test utilities.

use runlet_core::config::{AppConfig, MetadataConfig, StorageConfig};
use runlet_metadata::{MetadataStore, SqliteStore};
use runlet_sandbox::{Capabilities, SandboxEngine};
use runlet_server::{AppState, Coordinator, Executor, create_router};
use runlet_storage::{BlobStore, FilesystemBackend};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with filesystem storage and SQLite metadata
    /// in a temporary directory.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn BlobStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig {
            storage: StorageConfig::Filesystem { path: storage_path },
            metadata: MetadataConfig::Sqlite {
                path: db_path,
                query_timeout_secs: None,
            },
            ..AppConfig::for_testing()
        };
        modifier(&mut config);

        let engine = SandboxEngine::new(
            &Capabilities::from_config(&config.sandbox),
            &config.sandbox.limits,
        )
        .expect("Failed to create sandbox engine");

        let state = AppState::new(config, storage, metadata, engine);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.state.coordinator
    }

    pub fn executor(&self) -> &Executor {
        &self.state.executor
    }

    pub fn storage(&self) -> Arc<dyn BlobStore> {
        self.state.storage.clone()
    }

    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }
}
