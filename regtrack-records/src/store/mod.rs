//! Record store boundary
//!
//! Thin persistence seam used by every other component. The store
//! speaks Mongo-style match fragments (see [`filter`]) over JSON
//! documents; all record kinds live in one logical collection,
//! discriminated by `_schemaName`.

pub mod filter;
pub mod sqlite;

use async_trait::async_trait;
use regtrack_common::Result;
use serde_json::Value;

pub use sqlite::SqliteRecordStore;

/// Collection-style document store
///
/// `update_one` replaces the first document matching the filter and
/// reports the matched count; a zero return with a guarded filter is
/// the conditional-update miss the lifecycle engine's conflict
/// signalling relies on. `delete_many` removes all matching documents
/// in one all-or-nothing batch.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All documents matching the filter
    async fn find(&self, filter: &Value) -> Result<Vec<Value>>;

    /// Insert one document (`_id` and `_schemaName` are required)
    async fn insert(&self, doc: &Value) -> Result<()>;

    /// Replace the first document matching the filter; returns 0 or 1.
    /// The filter is re-evaluated atomically with the write, so guard
    /// conditions cannot be raced past.
    async fn update_one(&self, filter: &Value, doc: &Value) -> Result<u64>;

    /// Delete every document matching the filter in one batch; returns
    /// the number of deleted documents
    async fn delete_many(&self, filter: &Value) -> Result<u64>;
}
