//! Cascading delete engine
//!
//! Deleting a master takes its flavours, its documents, and the
//! documents' backing blobs with it; deleting a single flavour unhooks
//! it from its master and from any BCMI collections referencing it.
//!
//! Blob deletion is best-effort: failures are logged and never block
//! metadata deletion. The metadata batch itself is all-or-nothing (one
//! `delete_many` call). No locking across calls: callers must not
//! issue two concurrent deletes of the same master.

use futures::future::{join_all, try_join_all};
use regtrack_common::models::{CollectionBcmi, DocumentRecord, RegulatoryRecord};
use regtrack_common::roles::Audience;
use regtrack_common::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::object_store::ObjectStore;
use crate::store::RecordStore;

/// Cascading delete over the record store and object storage
pub struct CascadeDelete {
    store: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
}

impl CascadeDelete {
    pub fn new(store: Arc<dyn RecordStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { store, objects }
    }

    /// Delete a master record together with all of its flavours and
    /// documents
    ///
    /// Document blobs are deleted from object storage first,
    /// best-effort; the metadata rows (master + flavours + documents)
    /// then go in one all-or-nothing batch.
    pub async fn delete_master(&self, master_id: Uuid) -> Result<()> {
        let master = self.load_master(master_id).await?;

        let mut ids: Vec<String> = vec![master.id.to_string()];
        ids.extend(master.flavour_records.iter().map(Uuid::to_string));
        ids.extend(master.documents.iter().map(Uuid::to_string));

        self.delete_document_blobs(&master.documents).await?;

        let deleted = self
            .store
            .delete_many(&json!({ "_id": { "$in": ids } }))
            .await?;

        tracing::info!(
            master = %master_id,
            flavours = master.flavour_records.len(),
            documents = master.documents.len(),
            deleted_rows = deleted,
            "Deleted master record cascade"
        );
        Ok(())
    }

    /// Delete one flavour record, unhooking it from its master
    ///
    /// The master is found by reverse reference (`_flavourRecords`
    /// contains the flavour id). A BCMI flavour additionally clears the
    /// master's `mineGuid` and is pulled from every CollectionBCMI
    /// referencing it. All unhook writes are issued concurrently and
    /// awaited together; the first failure surfaces as the call's
    /// error. Flavour-only deletes never touch documents.
    pub async fn delete_flavour(&self, flavour_id: Uuid, flavour_type: Audience) -> Result<()> {
        let masters = self
            .store
            .find(&json!({ "_flavourRecords": flavour_id.to_string() }))
            .await?;
        let master_doc = masters.first().ok_or_else(|| {
            Error::NotFound(format!("No master references flavour {}", flavour_id))
        })?;
        let mut master = RegulatoryRecord::from_doc(master_doc)?;

        master.flavour_records.retain(|id| *id != flavour_id);
        master.set_published_flag(flavour_type, false);
        if flavour_type == Audience::Bcmi {
            master.mine_guid = None;
        }

        // (filter, replacement) pairs for every unhook write
        let mut writes: Vec<(Value, Value)> = vec![(
            json!({ "_id": master.id.to_string() }),
            master.to_doc()?,
        )];

        if flavour_type == Audience::Bcmi {
            let collections = self
                .store
                .find(&json!({
                    "_schemaName": CollectionBcmi::SCHEMA_NAME,
                    "records": flavour_id.to_string(),
                }))
                .await?;
            for doc in &collections {
                let mut collection = CollectionBcmi::from_doc(doc)?;
                collection.records.retain(|id| *id != flavour_id);
                writes.push((
                    json!({ "_id": collection.id.to_string() }),
                    collection.to_doc()?,
                ));
            }
        }

        try_join_all(
            writes
                .iter()
                .map(|(filter, doc)| self.store.update_one(filter, doc)),
        )
        .await?;

        self.store
            .delete_many(&json!({ "_id": flavour_id.to_string() }))
            .await?;

        tracing::info!(
            flavour = %flavour_id,
            master = %master.id,
            audience = %flavour_type,
            "Deleted flavour record"
        );
        Ok(())
    }

    /// Delete a single record row by id
    pub async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.store
            .delete_many(&json!({ "_id": id.to_string() }))
            .await?;
        Ok(())
    }

    async fn load_master(&self, master_id: Uuid) -> Result<RegulatoryRecord> {
        let docs = self
            .store
            .find(&json!({ "_id": master_id.to_string() }))
            .await?;
        let doc = docs
            .first()
            .ok_or_else(|| Error::NotFound(format!("Master record {}", master_id)))?;
        RegulatoryRecord::from_doc(doc)
    }

    /// Best-effort blob deletion for the master's documents
    async fn delete_document_blobs(&self, document_ids: &[Uuid]) -> Result<()> {
        if document_ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = document_ids.iter().map(Uuid::to_string).collect();
        let docs = self
            .store
            .find(&json!({
                "_schemaName": DocumentRecord::SCHEMA_NAME,
                "_id": { "$in": ids },
            }))
            .await?;

        let deletions = docs.iter().filter_map(|doc| {
            let document = DocumentRecord::from_doc(doc).ok()?;
            let key = document.key?;
            Some(async move {
                if let Err(e) = self.objects.delete_object(&key).await {
                    warn!(key = %key, error = %e, "Blob delete failed; continuing with metadata delete");
                }
            })
        });
        join_all(deletions).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::RecordLifecycle;
    use crate::store::SqliteRecordStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use regtrack_common::models::NewRecord;
    use regtrack_common::roles::RecordKind;
    use sqlx::SqlitePool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Object store double that always fails, counting attempts
    struct FailingObjectStore {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for FailingObjectStore {
        async fn delete_object(&self, _key: &str) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Internal("object storage unavailable".to_string()))
        }
    }

    struct NoopObjectStore;

    #[async_trait]
    impl ObjectStore for NoopObjectStore {
        async fn delete_object(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    async fn store() -> Arc<SqliteRecordStore> {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        Arc::new(SqliteRecordStore::from_pool(pool).await.unwrap())
    }

    fn admin_roles() -> Vec<String> {
        vec![
            "admin:nrced".to_string(),
            "admin:lng".to_string(),
            "admin:bcmi".to_string(),
        ]
    }

    async fn seed_master_with_flavours_and_documents(
        store: &Arc<SqliteRecordStore>,
    ) -> (Uuid, Vec<Uuid>, Vec<Uuid>) {
        let lifecycle = RecordLifecycle::new(store.clone() as Arc<dyn RecordStore>);
        let master = lifecycle
            .create_master(
                RecordKind::Order,
                NewRecord {
                    record_name: Some("Order O-1".to_string()),
                    ..NewRecord::default()
                },
                "tester",
                &admin_roles(),
            )
            .await
            .unwrap();

        lifecycle
            .publish(master.id, Audience::Nrced, "tester", &admin_roles())
            .await
            .unwrap();
        lifecycle
            .publish(master.id, Audience::Bcmi, "tester", &admin_roles())
            .await
            .unwrap();

        let d1 = lifecycle
            .attach_document(master.id, "a.pdf", None, Some("blobs/a".to_string()), "tester")
            .await
            .unwrap();
        let d2 = lifecycle
            .attach_document(master.id, "b.pdf", None, Some("blobs/b".to_string()), "tester")
            .await
            .unwrap();

        let master = lifecycle.load_master(master.id).await.unwrap();
        (master.id, master.flavour_records, vec![d1.id, d2.id])
    }

    #[tokio::test]
    async fn test_delete_master_removes_all_rows_in_one_batch() {
        let store = store().await;
        let (master_id, flavours, documents) =
            seed_master_with_flavours_and_documents(&store).await;

        let engine = CascadeDelete::new(store.clone(), Arc::new(NoopObjectStore));
        engine.delete_master(master_id).await.unwrap();

        assert!(store.find(&json!({"_id": master_id.to_string()})).await.unwrap().is_empty());
        for id in flavours.iter().chain(documents.iter()) {
            assert!(
                store.find(&json!({"_id": id.to_string()})).await.unwrap().is_empty(),
                "row {} should be gone",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_blob_failures_never_block_metadata_delete() {
        let store = store().await;
        let (master_id, flavours, documents) =
            seed_master_with_flavours_and_documents(&store).await;

        let objects = Arc::new(FailingObjectStore {
            attempts: AtomicUsize::new(0),
        });
        let engine = CascadeDelete::new(store.clone(), objects.clone());

        // Every blob delete fails, the call still succeeds
        engine.delete_master(master_id).await.unwrap();
        assert_eq!(objects.attempts.load(Ordering::SeqCst), 2);

        for id in [master_id].iter().chain(flavours.iter()).chain(documents.iter()) {
            assert!(store.find(&json!({"_id": id.to_string()})).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_delete_bcmi_flavour_fans_out_to_collections() {
        let store = store().await;
        let lifecycle = RecordLifecycle::new(store.clone() as Arc<dyn RecordStore>);
        let master = lifecycle
            .create_master(
                RecordKind::Order,
                NewRecord {
                    record_name: Some("Order O-1".to_string()),
                    mine_guid: Some("mine-7".to_string()),
                    ..NewRecord::default()
                },
                "tester",
                &admin_roles(),
            )
            .await
            .unwrap();
        let flavour = match lifecycle
            .publish(master.id, Audience::Bcmi, "tester", &admin_roles())
            .await
            .unwrap()
        {
            crate::lifecycle::PublishOutcome::Published(f) => f,
            other => panic!("Expected Published, got {:?}", other),
        };

        // Two collections reference the flavour, one does not
        let other_id = Uuid::new_v4();
        for (name, records) in [
            ("2019 permits", vec![flavour.id, other_id]),
            ("Enforcement actions", vec![flavour.id]),
            ("Unrelated", vec![other_id]),
        ] {
            let collection = CollectionBcmi {
                id: Uuid::new_v4(),
                schema_name: CollectionBcmi::SCHEMA_NAME.to_string(),
                read: vec!["sysadmin".to_string()],
                write: vec!["sysadmin".to_string()],
                name: name.to_string(),
                mine_guid: Some("mine-7".to_string()),
                records,
                date_added: Some(Utc::now()),
                added_by: Some("tester".to_string()),
            };
            store.insert(&collection.to_doc().unwrap()).await.unwrap();
        }

        let engine = CascadeDelete::new(store.clone(), Arc::new(NoopObjectStore));
        engine.delete_flavour(flavour.id, Audience::Bcmi).await.unwrap();

        // Flavour row is gone
        assert!(store.find(&json!({"_id": flavour.id.to_string()})).await.unwrap().is_empty());

        // Master cleared its link, flag, and mine guid
        let master = lifecycle.load_master(master.id).await.unwrap();
        assert!(master.flavour_records.is_empty());
        assert!(!master.is_bcmi_published);
        assert!(master.mine_guid.is_none());

        // No collection still references the deleted flavour
        let referencing = store
            .find(&json!({
                "_schemaName": CollectionBcmi::SCHEMA_NAME,
                "records": flavour.id.to_string(),
            }))
            .await
            .unwrap();
        assert!(referencing.is_empty());

        // Unrelated collection entries survive
        let with_other = store
            .find(&json!({
                "_schemaName": CollectionBcmi::SCHEMA_NAME,
                "records": other_id.to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(with_other.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_nrced_flavour_clears_flag_only() {
        let store = store().await;
        let lifecycle = RecordLifecycle::new(store.clone() as Arc<dyn RecordStore>);
        let master = lifecycle
            .create_master(
                RecordKind::Inspection,
                NewRecord {
                    mine_guid: Some("mine-7".to_string()),
                    ..NewRecord::default()
                },
                "tester",
                &admin_roles(),
            )
            .await
            .unwrap();
        let flavour = match lifecycle
            .publish(master.id, Audience::Nrced, "tester", &admin_roles())
            .await
            .unwrap()
        {
            crate::lifecycle::PublishOutcome::Published(f) => f,
            other => panic!("Expected Published, got {:?}", other),
        };

        let engine = CascadeDelete::new(store.clone(), Arc::new(NoopObjectStore));
        engine.delete_flavour(flavour.id, Audience::Nrced).await.unwrap();

        let master = lifecycle.load_master(master.id).await.unwrap();
        assert!(!master.is_nrced_published);
        assert!(master.flavour_records.is_empty());
        // NRCED delete does not touch the mine association
        assert_eq!(master.mine_guid.as_deref(), Some("mine-7"));
    }

    #[tokio::test]
    async fn test_delete_flavour_without_master_is_not_found() {
        let store = store().await;
        let engine = CascadeDelete::new(store.clone(), Arc::new(NoopObjectStore));
        let err = engine.delete_flavour(Uuid::new_v4(), Audience::Lng).await;
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_flavour_delete_never_deletes_documents() {
        let store = store().await;
        let (master_id, flavours, documents) =
            seed_master_with_flavours_and_documents(&store).await;

        let engine = CascadeDelete::new(store.clone(), Arc::new(FailingObjectStore {
            attempts: AtomicUsize::new(0),
        }));
        // Delete only the NRCED flavour
        engine.delete_flavour(flavours[0], Audience::Nrced).await.unwrap();

        for id in &documents {
            assert_eq!(
                store.find(&json!({"_id": id.to_string()})).await.unwrap().len(),
                1,
                "documents stay with the master on flavour-only delete"
            );
        }
        assert_eq!(
            store.find(&json!({"_id": master_id.to_string()})).await.unwrap().len(),
            1
        );
    }
}
