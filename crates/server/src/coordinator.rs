//! The coordinator: sole mutator of script records, content, env and the
//! handler cache.
//!
//! There is no transaction spanning the metadata store and the blob store, so
//! every operation follows a fixed write order. A crash part-way through
//! leaves at worst an orphaned blob, never a record whose content is missing.
//! The one exception is delete, which removes blobs before the record.
//!
//! | operation   | order                                                        |
//! |-------------|--------------------------------------------------------------|
//! | add         | content (if unclaimed), record, env                          |
//! | edit        | content, env (if given), touch record, invalidate            |
//! | name change | new content, record, move env, invalidate, old content gone  |
//! | delete      | env, content, invalidate, record                             |
//!
//! All validation finishes before the first mutating store call. Content for
//! a newly claimed name is written with `put_if_not_exists`, so a caller
//! whose name check went stale never replaces a blob another record owns.

use crate::metrics;
use bytes::Bytes;
use dashmap::DashMap;
use runlet_core::{Error, OwnerId, Result, ScriptId, ScriptIdentity, ScriptName};
use runlet_metadata::{MetadataStore, NewScript, ScriptRow};
use runlet_sandbox::{CompiledHandler, HandlerCache, contract};
use runlet_storage::{BlobStore, BlobStoreJsonExt, StorageError};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::instrument;

/// Content plus env as read by the execute path.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    pub content: String,
    pub env: Option<Value>,
}

/// Keeps the metadata store, blob store and handler cache consistent.
pub struct Coordinator {
    storage: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    cache: Arc<HandlerCache<CompiledHandler>>,
    /// Serializes same-name claims within this process.
    name_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

fn validate_content(content: &[u8]) -> Result<()> {
    let source = std::str::from_utf8(content)
        .map_err(|_| Error::InvalidContent("script content must be UTF-8".to_string()))?;
    contract::check(source).map_err(|e| Error::InvalidContent(e.0))
}

fn validate_env(env: Option<&Value>) -> Result<()> {
    match env {
        Some(value) if !value.is_object() => Err(Error::InvalidContent(
            "env must be a JSON object".to_string(),
        )),
        _ => Ok(()),
    }
}

impl Coordinator {
    pub fn new(
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        cache: Arc<HandlerCache<CompiledHandler>>,
    ) -> Self {
        Self {
            storage,
            metadata,
            cache,
            name_locks: DashMap::new(),
        }
    }

    async fn with_name_lock<T>(&self, name: &str, op: impl Future<Output = Result<T>>) -> Result<T> {
        let lock = self.name_locks.entry(name.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            op.await
        };
        drop(lock);
        self.name_locks
            .remove_if(name, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn owned_record(&self, owner: OwnerId, id: ScriptId) -> Result<ScriptRow> {
        let row = self
            .metadata
            .get_script(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("script {id}")))?;
        if row.owner_id != owner {
            return Err(Error::Forbidden(format!("script {id} belongs to another owner")));
        }
        Ok(row)
    }

    async fn ensure_name_free(&self, owner: OwnerId, identity: &ScriptIdentity) -> Result<()> {
        if self
            .metadata
            .name_taken(owner, identity.scope.as_str(), identity.name.as_str())
            .await?
        {
            return Err(Error::NameConflict(format!(
                "script name {} is already in use",
                identity.name
            )));
        }
        Ok(())
    }

    /// Write content under a key the caller has just checked to be free.
    ///
    /// The name check can be stale when another process claims the same name
    /// concurrently, so an existing blob is only replaced when no record holds
    /// the identity. Otherwise the caller lost the race.
    async fn claim_content(&self, identity: &ScriptIdentity, content: Bytes) -> Result<()> {
        let key = identity.content_key();
        if self.storage.put_if_not_exists(&key, content.clone()).await? {
            return Ok(());
        }
        if self
            .metadata
            .find_script(identity.scope.as_str(), identity.name.as_str())
            .await?
            .is_some()
        {
            return Err(Error::NameConflict(format!(
                "script name {} is already in use",
                identity.name
            )));
        }
        tracing::warn!(script = %identity, "replacing orphaned script content");
        self.storage.put(&key, content).await?;
        Ok(())
    }

    /// Delete a blob, treating an absent one as already deleted.
    async fn delete_blob(&self, key: &str) -> Result<()> {
        match self.storage.delete(key).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a script. Returns the new record's id.
    #[instrument(skip(self, content, env))]
    pub async fn add(
        &self,
        owner: OwnerId,
        scope: &str,
        name: &str,
        content: &[u8],
        env: Option<&Value>,
    ) -> Result<ScriptId> {
        let identity = ScriptIdentity::parse(scope, name)?;
        validate_content(content)?;
        validate_env(env)?;

        self.with_name_lock(name, async {
            self.ensure_name_free(owner, &identity).await?;

            self.claim_content(&identity, Bytes::copy_from_slice(content))
                .await?;
            let row = self
                .metadata
                .create_script(&NewScript {
                    owner_id: owner,
                    scope: identity.scope.to_string(),
                    name: identity.name.to_string(),
                })
                .await?;
            if let Some(env) = env {
                self.storage.put_object(&identity.env_key(), env).await?;
            }
            self.cache.invalidate(&identity.cache_key());

            tracing::info!(script_id = row.script_id, "script added");
            metrics::record_mutation("add");
            Ok(row.script_id)
        })
        .await
    }

    /// Replace a script's content, optionally renaming it and replacing its
    /// env. `env = None` leaves the stored env untouched.
    #[instrument(skip(self, content, env))]
    pub async fn edit(
        &self,
        owner: OwnerId,
        id: ScriptId,
        name: &str,
        content: &[u8],
        env: Option<&Value>,
    ) -> Result<()> {
        let new_name = ScriptName::new(name)?;
        validate_content(content)?;
        validate_env(env)?;
        let row = self.owned_record(owner, id).await?;
        let current = ScriptIdentity::parse(&row.scope, &row.name)?;

        if current.name == new_name {
            self.storage
                .put(&current.content_key(), Bytes::copy_from_slice(content))
                .await?;
            if let Some(env) = env {
                self.storage.put_object(&current.env_key(), env).await?;
            }
            self.metadata.touch_script(id).await?;
            self.cache.invalidate(&current.cache_key());
            tracing::info!("script edited");
        } else {
            let target = ScriptIdentity::new(current.scope.clone(), new_name);
            self.with_name_lock(name, async {
                self.ensure_name_free(owner, &target).await?;
                self.change_name(&row, &current, &target, Bytes::copy_from_slice(content), env)
                    .await
            })
            .await?;
            tracing::info!(old_name = %current.name, "script edited and renamed");
        }
        metrics::record_mutation("edit");
        Ok(())
    }

    /// Rename a script, keeping its content and env.
    #[instrument(skip(self))]
    pub async fn rename(&self, owner: OwnerId, id: ScriptId, new_name: &str) -> Result<()> {
        let new_name = ScriptName::new(new_name)?;
        let row = self.owned_record(owner, id).await?;
        let current = ScriptIdentity::parse(&row.scope, &row.name)?;
        if current.name == new_name {
            return Ok(());
        }
        let content = self.storage.get(&current.content_key()).await?;
        let target = ScriptIdentity::new(current.scope.clone(), new_name);

        self.with_name_lock(target.name.as_str(), async {
            self.ensure_name_free(owner, &target).await?;
            self.change_name(&row, &current, &target, content, None).await
        })
        .await?;

        tracing::info!(old_name = %current.name, new_name = %target.name, "script renamed");
        metrics::record_mutation("rename");
        Ok(())
    }

    /// Move a script from `from` to `to`: new content, record, env, cache,
    /// then the old content blob.
    async fn change_name(
        &self,
        row: &ScriptRow,
        from: &ScriptIdentity,
        to: &ScriptIdentity,
        content: Bytes,
        env: Option<&Value>,
    ) -> Result<()> {
        self.claim_content(to, content).await?;
        self.metadata
            .rename_script(row.script_id, to.name.as_str())
            .await?;

        match env {
            Some(env) => self.storage.put_object(&to.env_key(), env).await?,
            None => match self.storage.get(&from.env_key()).await {
                Ok(data) => self.storage.put(&to.env_key(), data).await?,
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            },
        }
        self.delete_blob(&from.env_key()).await?;

        self.cache.invalidate(&from.cache_key());
        self.cache.invalidate(&to.cache_key());
        self.delete_blob(&from.content_key()).await
    }

    /// Delete a script. Blobs go first so the record is the last thing
    /// removed; a failure in between leaves a record without content.
    #[instrument(skip(self))]
    pub async fn delete(&self, owner: OwnerId, id: ScriptId) -> Result<()> {
        let row = self.owned_record(owner, id).await?;
        let identity = ScriptIdentity::parse(&row.scope, &row.name)?;

        self.delete_blob(&identity.env_key()).await?;
        self.delete_blob(&identity.content_key()).await?;
        self.cache.invalidate(&identity.cache_key());
        self.metadata.delete_script(id).await?;

        tracing::info!(script = %identity, "script deleted");
        metrics::record_mutation("delete");
        Ok(())
    }

    pub async fn get(&self, owner: OwnerId, id: ScriptId) -> Result<ScriptRow> {
        self.owned_record(owner, id).await
    }

    /// Raw content of an owned script.
    #[instrument(skip(self))]
    pub async fn get_content(&self, owner: OwnerId, id: ScriptId) -> Result<Bytes> {
        let row = self.owned_record(owner, id).await?;
        let identity = ScriptIdentity::parse(&row.scope, &row.name)?;
        Ok(self.storage.get(&identity.content_key()).await?)
    }

    pub async fn list(&self, owner: OwnerId) -> Result<Vec<ScriptRow>> {
        Ok(self.metadata.list_scripts(owner).await?)
    }

    /// Read content and env for the execute path.
    #[instrument(skip(self), fields(script = %identity))]
    pub async fn fetch_source(&self, identity: &ScriptIdentity) -> Result<ScriptSource> {
        let data = self
            .storage
            .get(&identity.content_key())
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => Error::NotFound(format!("script {identity}")),
                other => other.into(),
            })?;
        let content = String::from_utf8(data.to_vec())
            .map_err(|_| Error::InvalidContent(format!("content of {identity} is not UTF-8")))?;
        let env: Option<Value> = self.storage.get_object(&identity.env_key()).await?;
        Ok(ScriptSource { content, env })
    }
}
