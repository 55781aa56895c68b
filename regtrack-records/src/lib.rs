//! # Regtrack Record Engine
//!
//! The backend record engine: document store boundary, record
//! lifecycle (create/publish/unpublish), cascading delete, and search.
//!
//! One logical collection holds every record kind, discriminated by
//! `_schemaName`. Publication state of a flavour record is encoded
//! purely by whether `'public'` appears in its `read` array.

pub mod delete;
pub mod lifecycle;
pub mod object_store;
pub mod search;
pub mod store;

pub use delete::CascadeDelete;
pub use lifecycle::{PublishOutcome, RecordLifecycle, UnpublishOutcome};
pub use object_store::{FsObjectStore, ObjectStore};
pub use store::{RecordStore, SqliteRecordStore};
