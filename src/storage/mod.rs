// SPDX-License-Identifier: MIT
//! Content persistence for open projects.
//!
//! The store holds opaque JSON records keyed by `(project_id, key)` —
//! last-writer-wins, no transactions across keys. The SQLite store is the
//! primary autosave path; [`file::FileContentStore`] is the secondary path
//! used when a primary write fails and as the recovery source.

pub mod file;

use crate::error::StoreError;
use crate::project::ProjectId;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

/// Default timeout for individual SQLite queries.
/// Prevents a hung query from wedging the autosave path indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(
    fut: impl std::future::Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!(
            "query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        ))),
    }
}

/// Contract between the settings controller and its persistence collaborator.
///
/// Implementations may fail; callers degrade (defaults on read failure, stay
/// dirty on write failure) rather than propagate.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_content(
        &self,
        project_id: &ProjectId,
        key: &str,
    ) -> Result<Option<Value>, StoreError>;

    async fn save_content(
        &self,
        project_id: &ProjectId,
        key: &str,
        value: &Value,
    ) -> Result<(), StoreError>;
}

// ─── SqliteContentStore ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SqliteContentStore {
    pool: SqlitePool,
}

impl SqliteContentStore {
    pub async fn new(data_dir: &Path) -> Result<Self, StoreError> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create the store with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(
        data_dir: &Path,
        slow_query_ms: u64,
    ) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let db_path = data_dir.join("courseforge.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS project_content (\
             project_id TEXT NOT NULL, \
             key TEXT NOT NULL, \
             value TEXT NOT NULL, \
             updated_at INTEGER NOT NULL, \
             PRIMARY KEY (project_id, key))",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    fn unixepoch() -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn get_content(
        &self,
        project_id: &ProjectId,
        key: &str,
    ) -> Result<Option<Value>, StoreError> {
        let row: Option<(String,)> = with_timeout(async {
            sqlx::query_as("SELECT value FROM project_content WHERE project_id = ? AND key = ?")
                .bind(project_id.as_str())
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::from)
        })
        .await?;

        match row {
            Some((raw,)) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::read(key, e)),
            None => Ok(None),
        }
    }

    async fn save_content(
        &self,
        project_id: &ProjectId,
        key: &str,
        value: &Value,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|e| StoreError::write(key, e))?;
        with_timeout(async {
            sqlx::query(
                "INSERT INTO project_content (project_id, key, value, updated_at) \
                 VALUES (?, ?, ?, ?) \
                 ON CONFLICT(project_id, key) DO UPDATE SET \
                 value = excluded.value, updated_at = excluded.updated_at",
            )
            .bind(project_id.as_str())
            .bind(key)
            .bind(&raw)
            .bind(Self::unixepoch())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
            Ok(())
        })
        .await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
