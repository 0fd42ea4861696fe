//! Database models mapping to the metadata schema.

use runlet_core::{OwnerId, ScriptId};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Script record. Unique on (owner_id, name) and on (scope, name).
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ScriptRow {
    pub script_id: ScriptId,
    pub owner_id: OwnerId,
    pub scope: String,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields supplied by the caller when creating a record.
#[derive(Debug, Clone)]
pub struct NewScript {
    pub owner_id: OwnerId,
    pub scope: String,
    pub name: String,
}
