//! Script record repository trait.

use crate::error::MetadataResult;
use crate::models::{NewScript, ScriptRow};
use async_trait::async_trait;
use runlet_core::{OwnerId, ScriptId};

/// Repository for script records.
#[async_trait]
pub trait ScriptRepo: Send + Sync {
    /// Get a record by its id.
    async fn get_script(&self, script_id: ScriptId) -> MetadataResult<Option<ScriptRow>>;

    /// Find the record holding `name` inside `scope`, whoever owns it.
    async fn find_script(&self, scope: &str, name: &str) -> MetadataResult<Option<ScriptRow>>;

    /// Whether `name` is already used by this owner or inside this scope.
    async fn name_taken(&self, owner_id: OwnerId, scope: &str, name: &str)
    -> MetadataResult<bool>;

    /// Insert a new record.
    ///
    /// Returns `MetadataError::AlreadyExists` when either uniqueness
    /// constraint rejects the row.
    async fn create_script(&self, script: &NewScript) -> MetadataResult<ScriptRow>;

    /// Change a record's name.
    ///
    /// Returns `MetadataError::NotFound` for an unknown id and
    /// `MetadataError::AlreadyExists` when the new name is taken.
    async fn rename_script(&self, script_id: ScriptId, new_name: &str)
    -> MetadataResult<ScriptRow>;

    /// Bump `updated_at` after a content change.
    async fn touch_script(&self, script_id: ScriptId) -> MetadataResult<()>;

    /// Delete a record. Returns `MetadataError::NotFound` if it is absent.
    async fn delete_script(&self, script_id: ScriptId) -> MetadataResult<()>;

    /// List an owner's records ordered by name.
    async fn list_scripts(&self, owner_id: OwnerId) -> MetadataResult<Vec<ScriptRow>>;

    /// List every record, used by the startup orphan report.
    async fn list_all_scripts(&self) -> MetadataResult<Vec<ScriptRow>>;
}
