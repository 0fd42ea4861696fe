use runlet_storage::{BlobStore, FilesystemBackend, MemoryBackend};
use std::sync::Arc;
use tempfile::TempDir;

/// Every backend under test, each paired with the temp dir that must outlive it.
pub async fn all_backends() -> Vec<(Arc<dyn BlobStore>, Option<TempDir>)> {
    let dir = tempfile::tempdir().unwrap();
    let fs = FilesystemBackend::new(dir.path()).await.unwrap();
    vec![
        (Arc::new(fs) as Arc<dyn BlobStore>, Some(dir)),
        (Arc::new(MemoryBackend::new()) as Arc<dyn BlobStore>, None),
    ]
}
