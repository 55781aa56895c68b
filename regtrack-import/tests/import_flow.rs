//! End-to-end import over the public API: CSV rows in, upserted master
//! records and persisted task progress out.

use regtrack_import::transform::DatasourceKind;
use regtrack_import::{CsvRow, DataSource, SqliteAuditSink};
use regtrack_common::roles::RecordKind;
use regtrack_records::store::{RecordStore, SqliteRecordStore};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

fn row(entries: &[(&str, &str)]) -> CsvRow {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_import_then_rerun_updates_in_place() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    let store = Arc::new(SqliteRecordStore::from_pool(pool).await.unwrap());
    let audit = Arc::new(
        SqliteAuditSink::from_pool(store.pool().clone())
            .await
            .unwrap(),
    );
    let task_id = Uuid::new_v4();

    let first_run = vec![
        row(&[
            ("record_id", "W-1"),
            ("record_name", "Warning W-1"),
            ("issuing_agency", "ENV"),
            ("date_issued", "2021-07-01"),
        ]),
        row(&[
            ("record_id", "W-2"),
            ("record_name", "Warning W-2"),
            ("issuing_agency", "ENV"),
        ]),
    ];

    let status = DataSource::new(
        store.clone(),
        audit.clone(),
        task_id,
        "importer",
        vec!["admin:nrced".to_string()],
        DatasourceKind::AgencyCsv,
        RecordKind::Warning,
        first_run,
    )
    .run()
    .await;

    assert!(status.is_clean());
    assert_eq!(status.items_processed, 2);
    assert!(status.message.is_some());

    let (total, processed, failures) = audit.task_progress(task_id).await.unwrap().unwrap();
    assert_eq!((total, processed, failures), (2, 2, 0));

    // A rerun with amended data updates the same rows
    let second_run = vec![row(&[
        ("record_id", "W-1"),
        ("record_name", "Warning W-1 (amended)"),
    ])];
    let status = DataSource::new(
        store.clone(),
        audit,
        Uuid::new_v4(),
        "importer",
        vec!["admin:nrced".to_string()],
        DatasourceKind::AgencyCsv,
        RecordKind::Warning,
        second_run,
    )
    .run()
    .await;
    assert!(status.is_clean());

    let warnings = store
        .find(&json!({ "_schemaName": "Warning" }))
        .await
        .unwrap();
    assert_eq!(warnings.len(), 2);

    let amended = store
        .find(&json!({ "_schemaName": "Warning", "_sourceRefId": "W-1" }))
        .await
        .unwrap();
    assert_eq!(amended.len(), 1);
    assert_eq!(amended[0]["recordName"], "Warning W-1 (amended)");
    // Audit trail distinguishes creator and editor timestamps
    assert!(amended[0]["dateUpdated"].is_string());
}
