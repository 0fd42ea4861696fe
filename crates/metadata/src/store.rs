//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{NewScript, ScriptRow};
use crate::repos::ScriptRepo;
use async_trait::async_trait;
use runlet_core::{OwnerId, ScriptId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::instrument;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ScriptRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// Map a uniqueness violation to `AlreadyExists`, anything else to `Database`.
pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> MetadataError {
    match err {
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref() == Some("23505")
                || db_err.message().contains("UNIQUE constraint") =>
        {
            MetadataError::AlreadyExists(what.to_string())
        }
        other => MetadataError::Database(other),
    }
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Create a new SQLite store and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(30);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // A single connection avoids "database is locked" under concurrent writers.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout: Duration::from_secs(query_timeout_secs),
        };
        store.migrate().await?;

        tracing::warn!(
            query_timeout_secs,
            "SQLite query timeout is advisory only; use PostgreSQL for multi-node deployments"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn note_slow(&self, operation: &'static str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed > self.query_timeout {
            tracing::warn!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow SQLite query exceeded advisory timeout"
            );
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ScriptRepo for SqliteStore {
    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_script(&self, script_id: ScriptId) -> MetadataResult<Option<ScriptRow>> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, ScriptRow>("SELECT * FROM scripts WHERE script_id = ?")
            .bind(script_id)
            .fetch_optional(&self.pool)
            .await?;
        self.note_slow("get_script", started);
        Ok(row)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn find_script(&self, scope: &str, name: &str) -> MetadataResult<Option<ScriptRow>> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, ScriptRow>(
            "SELECT * FROM scripts WHERE scope = ? AND name = ?",
        )
        .bind(scope)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        self.note_slow("find_script", started);
        Ok(row)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn name_taken(&self, owner_id: OwnerId, scope: &str, name: &str) -> MetadataResult<bool> {
        let started = Instant::now();
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM scripts WHERE name = ? AND (owner_id = ? OR scope = ?))",
        )
        .bind(name)
        .bind(owner_id)
        .bind(scope)
        .fetch_one(&self.pool)
        .await?;
        self.note_slow("name_taken", started);
        Ok(taken)
    }

    #[instrument(skip(self, script), fields(backend = "sqlite", owner_id = script.owner_id, script_name = %script.name))]
    async fn create_script(&self, script: &NewScript) -> MetadataResult<ScriptRow> {
        let started = Instant::now();
        let now = OffsetDateTime::now_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO scripts (owner_id, scope, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(script.owner_id)
        .bind(&script.scope)
        .bind(&script.name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("script name {}", script.name)))?;
        self.note_slow("create_script", started);

        Ok(ScriptRow {
            script_id: result.last_insert_rowid(),
            owner_id: script.owner_id,
            scope: script.scope.clone(),
            name: script.name.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn rename_script(
        &self,
        script_id: ScriptId,
        new_name: &str,
    ) -> MetadataResult<ScriptRow> {
        let started = Instant::now();
        let affected = sqlx::query("UPDATE scripts SET name = ?, updated_at = ? WHERE script_id = ?")
            .bind(new_name)
            .bind(OffsetDateTime::now_utc())
            .bind(script_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &format!("script name {new_name}")))?
            .rows_affected();
        self.note_slow("rename_script", started);

        if affected == 0 {
            return Err(MetadataError::NotFound(format!("script {script_id}")));
        }
        self.get_script(script_id)
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("script {script_id}")))
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn touch_script(&self, script_id: ScriptId) -> MetadataResult<()> {
        sqlx::query("UPDATE scripts SET updated_at = ? WHERE script_id = ?")
            .bind(OffsetDateTime::now_utc())
            .bind(script_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn delete_script(&self, script_id: ScriptId) -> MetadataResult<()> {
        let affected = sqlx::query("DELETE FROM scripts WHERE script_id = ?")
            .bind(script_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(MetadataError::NotFound(format!("script {script_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn list_scripts(&self, owner_id: OwnerId) -> MetadataResult<Vec<ScriptRow>> {
        let started = Instant::now();
        let rows = sqlx::query_as::<_, ScriptRow>(
            "SELECT * FROM scripts WHERE owner_id = ? ORDER BY name",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        self.note_slow("list_scripts", started);
        Ok(rows)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn list_all_scripts(&self) -> MetadataResult<Vec<ScriptRow>> {
        let started = Instant::now();
        let rows = sqlx::query_as::<_, ScriptRow>("SELECT * FROM scripts ORDER BY script_id")
            .fetch_all(&self.pool)
            .await?;
        self.note_slow("list_all_scripts", started);
        Ok(rows)
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS scripts (
    script_id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    scope TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_scripts_owner_name ON scripts(owner_id, name);
-- Storage keys derive from (scope, name), so it must be unique as well.
CREATE UNIQUE INDEX IF NOT EXISTS idx_scripts_scope_name ON scripts(scope, name);
"#;
