//! Audit sink
//!
//! Append-only progress updates keyed by an import task id. Progress
//! persists as batches complete, so a long run is observable while it
//! is still in flight.

use async_trait::async_trait;
use chrono::Utc;
use regtrack_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Partial status update for one import task; `None` fields are left
/// untouched
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub item_total: Option<usize>,
    pub items_processed: Option<usize>,
    pub failure_count: Option<usize>,
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn total(item_total: usize) -> Self {
        Self {
            item_total: Some(item_total),
            ..Self::default()
        }
    }

    pub fn progress(items_processed: usize, failure_count: usize) -> Self {
        Self {
            items_processed: Some(items_processed),
            failure_count: Some(failure_count),
            ..Self::default()
        }
    }
}

/// External progress tracker for import runs
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Apply a partial update to the task's audit record
    async fn update_task_record(&self, task_id: Uuid, update: &TaskUpdate) -> Result<()>;
}

/// SQLite-backed audit sink (`import_tasks` table)
#[derive(Clone)]
pub struct SqliteAuditSink {
    pool: SqlitePool,
}

impl SqliteAuditSink {
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS import_tasks (
                task_id TEXT PRIMARY KEY,
                item_total INTEGER NOT NULL DEFAULT 0,
                items_processed INTEGER NOT NULL DEFAULT 0,
                failure_count INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                started_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Current progress counters for a task (total, processed,
    /// failures)
    pub async fn task_progress(&self, task_id: Uuid) -> Result<Option<(i64, i64, i64)>> {
        let row = sqlx::query_as(
            "SELECT item_total, items_processed, failure_count FROM import_tasks WHERE task_id = ?",
        )
        .bind(task_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn update_task_record(&self, task_id: Uuid, update: &TaskUpdate) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO import_tasks (task_id, item_total, items_processed, failure_count, error, started_at, updated_at)
            VALUES (?, COALESCE(?, 0), COALESCE(?, 0), COALESCE(?, 0), ?, ?, ?)
            ON CONFLICT(task_id) DO UPDATE SET
                item_total = COALESCE(?, item_total),
                items_processed = COALESCE(?, items_processed),
                failure_count = COALESCE(?, failure_count),
                error = COALESCE(?, error),
                updated_at = ?
            "#,
        )
        .bind(task_id.to_string())
        .bind(update.item_total.map(|n| n as i64))
        .bind(update.items_processed.map(|n| n as i64))
        .bind(update.failure_count.map(|n| n as i64))
        .bind(update.error.as_deref())
        .bind(&now)
        .bind(&now)
        .bind(update.item_total.map(|n| n as i64))
        .bind(update.items_processed.map(|n| n as i64))
        .bind(update.failure_count.map(|n| n as i64))
        .bind(update.error.as_deref())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_updates_accumulate() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let sink = SqliteAuditSink::from_pool(pool).await.unwrap();
        let task_id = Uuid::new_v4();

        sink.update_task_record(task_id, &TaskUpdate::total(275))
            .await
            .unwrap();
        sink.update_task_record(task_id, &TaskUpdate::progress(100, 0))
            .await
            .unwrap();
        sink.update_task_record(task_id, &TaskUpdate::progress(199, 1))
            .await
            .unwrap();

        let (total, processed, failures) =
            sink.task_progress(task_id).await.unwrap().unwrap();
        assert_eq!(total, 275);
        assert_eq!(processed, 199);
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_error_is_recorded() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let sink = SqliteAuditSink::from_pool(pool).await.unwrap();
        let task_id = Uuid::new_v4();

        sink.update_task_record(
            task_id,
            &TaskUpdate {
                error: Some("unsupported record type".to_string()),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();

        let error: Option<String> =
            sqlx::query_scalar("SELECT error FROM import_tasks WHERE task_id = ?")
                .bind(task_id.to_string())
                .fetch_one(&sink.pool)
                .await
                .unwrap();
        assert_eq!(error.as_deref(), Some("unsupported record type"));
    }
}
