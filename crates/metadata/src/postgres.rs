//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{NewScript, ScriptRow};
use crate::repos::ScriptRepo;
use crate::store::{MetadataStore, map_unique_violation};
use async_trait::async_trait;
use runlet_core::config::PgSslMode;
use runlet_core::{OwnerId, ScriptId};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;
use tracing::instrument;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters,
    /// so the password can come from its own env var.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }
        if let Some(pass) = password {
            opts = opts.password(pass);
        }
        if let Some(mode) = ssl_mode {
            opts = opts.ssl_mode(match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            });
        }

        tracing::info!(
            host,
            port,
            database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements hold one statement each.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ScriptRepo for PostgresStore {
    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn get_script(&self, script_id: ScriptId) -> MetadataResult<Option<ScriptRow>> {
        let row = sqlx::query_as::<_, ScriptRow>("SELECT * FROM scripts WHERE script_id = $1")
            .bind(script_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn find_script(&self, scope: &str, name: &str) -> MetadataResult<Option<ScriptRow>> {
        let row = sqlx::query_as::<_, ScriptRow>(
            "SELECT * FROM scripts WHERE scope = $1 AND name = $2",
        )
        .bind(scope)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn name_taken(&self, owner_id: OwnerId, scope: &str, name: &str) -> MetadataResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM scripts WHERE name = $1 AND (owner_id = $2 OR scope = $3))",
        )
        .bind(name)
        .bind(owner_id)
        .bind(scope)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    #[instrument(skip(self, script), fields(backend = "postgres", owner_id = script.owner_id, script_name = %script.name))]
    async fn create_script(&self, script: &NewScript) -> MetadataResult<ScriptRow> {
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, ScriptRow>(
            r#"
            INSERT INTO scripts (owner_id, scope, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(script.owner_id)
        .bind(&script.scope)
        .bind(&script.name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("script name {}", script.name)))?;
        Ok(row)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn rename_script(
        &self,
        script_id: ScriptId,
        new_name: &str,
    ) -> MetadataResult<ScriptRow> {
        sqlx::query_as::<_, ScriptRow>(
            "UPDATE scripts SET name = $1, updated_at = $2 WHERE script_id = $3 RETURNING *",
        )
        .bind(new_name)
        .bind(OffsetDateTime::now_utc())
        .bind(script_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("script name {new_name}")))?
        .ok_or_else(|| MetadataError::NotFound(format!("script {script_id}")))
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn touch_script(&self, script_id: ScriptId) -> MetadataResult<()> {
        sqlx::query("UPDATE scripts SET updated_at = $1 WHERE script_id = $2")
            .bind(OffsetDateTime::now_utc())
            .bind(script_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn delete_script(&self, script_id: ScriptId) -> MetadataResult<()> {
        let affected = sqlx::query("DELETE FROM scripts WHERE script_id = $1")
            .bind(script_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(MetadataError::NotFound(format!("script {script_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn list_scripts(&self, owner_id: OwnerId) -> MetadataResult<Vec<ScriptRow>> {
        let rows = sqlx::query_as::<_, ScriptRow>(
            "SELECT * FROM scripts WHERE owner_id = $1 ORDER BY name",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn list_all_scripts(&self) -> MetadataResult<Vec<ScriptRow>> {
        let rows = sqlx::query_as::<_, ScriptRow>("SELECT * FROM scripts ORDER BY script_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::postgres_schema_statements;

    #[test]
    fn postgres_schema_statements_skips_empty_and_comment_only() {
        let schema = r#"
            -- comment only

            CREATE TABLE foo (id int);
            ;
            -- another comment
            CREATE TABLE bar (id int);
        "#;

        let statements = postgres_schema_statements(schema);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("CREATE TABLE foo"));
        assert!(statements[1].contains("CREATE TABLE bar"));
    }

    #[test]
    fn embedded_schema_has_both_unique_indexes() {
        let statements = postgres_schema_statements(super::POSTGRES_SCHEMA);
        assert_eq!(statements.len(), 3);
        assert!(statements.iter().any(|s| s.contains("(owner_id, name)")));
        assert!(statements.iter().any(|s| s.contains("(scope, name)")));
    }
}
