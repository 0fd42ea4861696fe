//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;

/// Byte-oriented blob store shared by script content and env objects.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's content. Missing objects yield `StorageError::NotFound`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically, replacing any previous value.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Put an object only if it doesn't exist. Returns whether it was written.
    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool>;

    /// Delete an object. Missing objects yield `StorageError::NotFound`.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List object keys starting with `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Get the name of this storage backend, used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// Called during server startup before any request is accepted. The
    /// default implementation returns Ok(()).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// JSON object helpers layered on top of any [`BlobStore`].
///
/// Implemented for every store through a blanket impl; do not implement it
/// manually.
pub trait BlobStoreJsonExt: BlobStore {
    /// Read and decode a JSON object. A missing object yields `Ok(None)`.
    fn get_object<'a, T>(
        &'a self,
        key: &'a str,
    ) -> impl Future<Output = StorageResult<Option<T>>> + Send + 'a
    where
        T: DeserializeOwned + Send + 'a,
    {
        async move {
            let data = match self.get(key).await {
                Ok(data) => data,
                Err(StorageError::NotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| StorageError::Serialization(format!("{key}: {e}")))
        }
    }

    /// Encode a value as JSON and store it under `key`.
    fn put_object<'a, T>(
        &'a self,
        key: &'a str,
        value: &T,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'a
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_vec(value);
        async move {
            let data =
                encoded.map_err(|e| StorageError::Serialization(format!("{key}: {e}")))?;
            self.put(key, Bytes::from(data)).await
        }
    }
}

impl<S: BlobStore + ?Sized> BlobStoreJsonExt for S {}
