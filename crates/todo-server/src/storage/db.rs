//! PostgreSQL record store
//!
//! Expects a `todos` table:
//! `id BIGSERIAL PRIMARY KEY, title TEXT NOT NULL, done BOOLEAN NOT NULL,
//! created_at TIMESTAMPTZ NOT NULL, updated_at TIMESTAMPTZ NOT NULL`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use todo_core::ports::storage::StoreResult;
use todo_core::ports::RecordStore;
use todo_core::{Record, RecordDraft, RecordPatch, StoreError};

pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Build the connection pool. `acquire_timeout` bounds how long a request
    /// waits for a pooled connection under saturation.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        tracing::info!(
            "Connecting to PostgreSQL (max_connections={})...",
            max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn create(&self, draft: &RecordDraft) -> StoreResult<Record> {
        let row: RecordRow = sqlx::query_as(
            r#"
            INSERT INTO todos (title, done, created_at, updated_at)
            VALUES ($1, $2, now(), now())
            RETURNING id, title, done, created_at, updated_at
            "#,
        )
        .bind(&draft.title)
        .bind(draft.done)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.into())
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<Option<Record>> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, title, done, created_at, updated_at
            FROM todos WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self) -> StoreResult<Vec<Record>> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT id, title, done, created_at, updated_at
            FROM todos
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update(&self, id: i64, patch: &RecordPatch) -> StoreResult<Option<Record>> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            UPDATE todos
            SET title = COALESCE($1, title),
                done = COALESCE($2, done),
                updated_at = now()
            WHERE id = $3
            RETURNING id, title, done, created_at, updated_at
            "#,
        )
        .bind(patch.title.as_deref())
        .bind(patch.done)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM todos WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut => StoreError::PoolTimedOut(e.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

// Helper struct for sqlx query_as
#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    title: String,
    done: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<RecordRow> for Record {
    fn from(r: RecordRow) -> Self {
        Record {
            id: r.id,
            title: r.title,
            done: r.done,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
