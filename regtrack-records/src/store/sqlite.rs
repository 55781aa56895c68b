//! SQLite-backed record store
//!
//! A single `records` table holds every record kind as a JSON document
//! with its `_schemaName` mirrored into an indexed column. Filters are
//! evaluated in Rust by the [`filter`](super::filter) evaluator; when a
//! filter pins `_schemaName`, the scan is prefiltered in SQL.
//!
//! `update_one` re-evaluates its filter inside the write transaction,
//! so a guarded filter acts as a conditional update: two racing callers
//! serialize on the database and the loser observes a matched count of
//! zero.

use async_trait::async_trait;
use regtrack_common::{Error, Result};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

use super::{filter, RecordStore};

/// SQLite document store
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (or create) the record database at the given path
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new record database: {}", db_path.display());
        } else {
            info!("Opened existing record database: {}", db_path.display());
        }

        // WAL allows concurrent readers during import runs
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// The underlying pool, for callers that keep auxiliary tables in
    /// the same database
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wrap an existing pool (tests use `:memory:`)
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                schema_name TEXT NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_schema ON records (schema_name)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Schema names a filter pins `_schemaName` to, if any
    fn schema_prefilter(filter_doc: &Value) -> Option<Vec<String>> {
        match filter_doc.get("_schemaName")? {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Object(ops) => match ops.get("$in")? {
                Value::Array(names) => Some(
                    names
                        .iter()
                        .filter_map(|n| n.as_str().map(str::to_string))
                        .collect(),
                ),
                _ => None,
            },
            _ => None,
        }
    }

    /// Fetch candidate rows, prefiltered by schema name where possible
    async fn candidates<'e, E>(executor: E, filter_doc: &Value) -> Result<Vec<(String, String)>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let rows: Vec<(String, String)> = match Self::schema_prefilter(filter_doc) {
            Some(names) if !names.is_empty() => {
                let placeholders = vec!["?"; names.len()].join(", ");
                let sql = format!(
                    "SELECT id, doc FROM records WHERE schema_name IN ({})",
                    placeholders
                );
                let mut query = sqlx::query_as(&sql);
                for name in &names {
                    query = query.bind(name);
                }
                query.fetch_all(executor).await?
            }
            _ => {
                sqlx::query_as("SELECT id, doc FROM records")
                    .fetch_all(executor)
                    .await?
            }
        };
        Ok(rows)
    }

    fn required_str<'a>(doc: &'a Value, field: &str) -> Result<&'a str> {
        doc.get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidInput(format!("Document is missing {}", field)))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find(&self, filter_doc: &Value) -> Result<Vec<Value>> {
        let rows = Self::candidates(&self.pool, filter_doc).await?;

        let mut results = Vec::new();
        for (_, doc_json) in rows {
            let doc: Value = serde_json::from_str(&doc_json)?;
            if filter::matches(&doc, filter_doc) {
                results.push(doc);
            }
        }
        Ok(results)
    }

    async fn insert(&self, doc: &Value) -> Result<()> {
        let id = Self::required_str(doc, "_id")?;
        let schema_name = Self::required_str(doc, "_schemaName")?;

        sqlx::query("INSERT INTO records (id, schema_name, doc) VALUES (?, ?, ?)")
            .bind(id)
            .bind(schema_name)
            .bind(serde_json::to_string(doc)?)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_one(&self, filter_doc: &Value, doc: &Value) -> Result<u64> {
        let id = Self::required_str(doc, "_id")?;
        let schema_name = Self::required_str(doc, "_schemaName")?;

        let mut tx = self.pool.begin().await?;

        // Re-evaluate the filter inside the transaction: the guard and
        // the write are atomic with respect to other writers
        let rows = Self::candidates(&mut *tx, filter_doc).await?;
        let matched = rows.iter().find(|(_, doc_json)| {
            serde_json::from_str::<Value>(doc_json)
                .map(|d| filter::matches(&d, filter_doc))
                .unwrap_or(false)
        });

        let Some((row_id, _)) = matched else {
            tx.rollback().await?;
            return Ok(0);
        };

        sqlx::query("UPDATE records SET id = ?, schema_name = ?, doc = ? WHERE id = ?")
            .bind(id)
            .bind(schema_name)
            .bind(serde_json::to_string(doc)?)
            .bind(row_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(1)
    }

    async fn delete_many(&self, filter_doc: &Value) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let rows = Self::candidates(&mut *tx, filter_doc).await?;
        let mut deleted = 0u64;
        for (row_id, doc_json) in rows {
            let doc: Value = serde_json::from_str(&doc_json)?;
            if filter::matches(&doc, filter_doc) {
                sqlx::query("DELETE FROM records WHERE id = ?")
                    .bind(&row_id)
                    .execute(&mut *tx)
                    .await?;
                deleted += 1;
            }
        }

        // One transaction: the metadata batch is all-or-nothing
        tx.commit().await?;
        Ok(deleted)
    }
}
