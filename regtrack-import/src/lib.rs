//! # Regtrack CSV Import Pipeline
//!
//! Batch ingestion of third-party datasets into the record model:
//! bounded-concurrency row processing, per-row idempotent upsert keyed
//! by the source reference id, per-row failure isolation (one bad row
//! never aborts a run), and append-only progress reporting to an audit
//! sink.

pub mod audit;
pub mod datasource;
pub mod status;
pub mod transform;

pub use audit::{AuditSink, SqliteAuditSink, TaskUpdate};
pub use datasource::DataSource;
pub use status::{ImportStatus, RowFailure};
pub use transform::{CsvRow, DatasourceKind, RecordTransformer, TransformerRegistry};
