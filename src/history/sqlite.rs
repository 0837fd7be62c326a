//! SQLite history backend.

use super::{HistoryStore, PersistentTaskRecord};
use crate::error::{Error, HistoryError, Result};
use crate::types::{GameId, TaskState};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::{FromRow, SqliteConnection};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// History kept in the `task_history` table of a SQLite database
#[derive(Clone, Debug)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    game_id: i64,
    state: i32,
    title: String,
    status_text: String,
    download_path: String,
    created_at: i64,
}

impl From<HistoryRow> for PersistentTaskRecord {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: GameId(row.game_id),
            state: TaskState::from_i32(row.state),
            title: row.title,
            status_text: row.status_text,
            download_path: PathBuf::from(row.download_path),
            timestamp: DateTime::from_timestamp_nanos(row.created_at),
        }
    }
}

impl SqliteHistoryStore {
    /// Open (creating if needed) the database at `path` and run migrations
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                HistoryError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                HistoryError::ConnectionFailed(format!("Failed to parse database path: {}", e))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            HistoryError::ConnectionFailed(format!("Failed to connect to database: {}", e))
        })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            HistoryError::ConnectionFailed(format!("Failed to acquire connection: {}", e))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            HistoryError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            ))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| {
                    HistoryError::QueryFailed(format!("Failed to query schema version: {}", e))
                })?;

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: task_history table
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying history database migration v1");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_history (
                position INTEGER PRIMARY KEY,
                game_id INTEGER NOT NULL,
                state INTEGER NOT NULL,
                title TEXT NOT NULL,
                status_text TEXT NOT NULL,
                download_path TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            HistoryError::MigrationFailed(format!("Failed to create task_history table: {}", e))
        })?;

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(1_i64)
            .bind(Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                HistoryError::MigrationFailed(format!("Failed to record migration v1: {}", e))
            })?;

        Ok(())
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn load(&self) -> Result<Vec<PersistentTaskRecord>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT game_id, state, title, status_text, download_path, created_at
            FROM task_history
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(PersistentTaskRecord::from).collect())
    }

    async fn save_all(&self, records: &[PersistentTaskRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Sqlx)?;

        sqlx::query("DELETE FROM task_history")
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?;

        for (position, record) in records.iter().enumerate() {
            let created_at = record
                .timestamp
                .timestamp_nanos_opt()
                .unwrap_or_else(|| record.timestamp.timestamp_micros().saturating_mul(1000));

            sqlx::query(
                r#"
                INSERT INTO task_history (
                    position, game_id, state, title, status_text, download_path, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(position as i64)
            .bind(record.id.0)
            .bind(record.state.to_i32())
            .bind(&record.title)
            .bind(&record.status_text)
            .bind(record.download_path.to_string_lossy().into_owned())
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Sqlx)?;
        }

        tx.commit().await.map_err(Error::Sqlx)?;

        tracing::debug!(count = records.len(), "saved download history to database");
        Ok(())
    }
}
