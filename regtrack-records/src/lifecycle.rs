//! Record lifecycle engine
//!
//! Owns create, update, publish, and unpublish across master and
//! flavour records. Per (master, audience) pair the states are:
//!
//! NotElected (no flavour) → Unpublished (flavour exists, `'public'` not
//! in `read`) → Published (`'public'` in `read`) → Unpublished → ...
//!
//! Re-publishing an already-public flavour (and re-unpublishing an
//! already-private one) is a conflict outcome, not an error. The
//! conflict check rides on the store's conditional `update_one`: the
//! guard filter and the write are atomic, so two racing publish calls
//! serialize and the loser gets the conflict outcome.
//!
//! Audit fields are set here and only here.

use chrono::Utc;
use regtrack_common::acl;
use regtrack_common::models::{DocumentRecord, NewRecord, RegulatoryRecord};
use regtrack_common::roles::{Audience, RecordKind, SchemaName, PUBLIC};
use regtrack_common::{Error, Result};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::RecordStore;

/// Result of a publish call
#[derive(Debug)]
pub enum PublishOutcome {
    /// The flavour is now public
    Published(RegulatoryRecord),
    /// The flavour was already public; nothing changed (409-equivalent)
    AlreadyPublished,
}

/// Result of an unpublish call
#[derive(Debug)]
pub enum UnpublishOutcome {
    /// `'public'` removed; the flavour record is kept for later
    /// republishing
    Unpublished(RegulatoryRecord),
    /// The flavour was already private; nothing changed
    /// (409-equivalent)
    AlreadyUnpublished,
}

/// Create/publish/unpublish engine over the record store
pub struct RecordLifecycle {
    store: Arc<dyn RecordStore>,
}

impl RecordLifecycle {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create a master record from caller-supplied business fields
    pub async fn create_master(
        &self,
        kind: RecordKind,
        fields: NewRecord,
        user: &str,
        user_roles: &[String],
    ) -> Result<RegulatoryRecord> {
        let now = Utc::now();
        let mut record = RegulatoryRecord {
            id: Uuid::new_v4(),
            schema_name: SchemaName::master(kind),
            read: vec![],
            write: vec![],
            active: true,
            record_name: fields.record_name,
            issuing_agency: fields.issuing_agency,
            legislation: fields.legislation,
            location: fields.location,
            centroid: fields.centroid,
            date_issued: fields.date_issued,
            description: fields.description,
            summary: fields.summary,
            outcome_description: fields.outcome_description,
            penalties: fields.penalties,
            issued_to: fields.issued_to,
            documents: vec![],
            flavour_records: vec![],
            master: None,
            mine_guid: fields.mine_guid,
            is_nrced_published: false,
            is_lng_published: false,
            is_bcmi_published: false,
            source_system_ref: fields.source_system_ref,
            source_ref_id: fields.source_ref_id,
            date_published: None,
            published_by: None,
            date_added: Some(now),
            added_by: Some(user.to_string()),
            date_updated: None,
            updated_by: None,
        };

        let master_acl = acl::roles_for_master(user_roles, kind);
        acl::apply_to_record(&mut record, &master_acl);

        self.store.insert(&record.to_doc()?).await?;
        tracing::info!(id = %record.id, schema = %record.schema_name, "Created master record");
        Ok(record)
    }

    /// Update a master's business fields
    ///
    /// Flavour links, documents, publication flags, and the original
    /// audit trail are preserved; only `dateUpdated`/`updatedBy` move.
    pub async fn update_master(
        &self,
        master_id: Uuid,
        changes: NewRecord,
        user: &str,
    ) -> Result<RegulatoryRecord> {
        let mut master = self.load_master(master_id).await?;

        master.record_name = changes.record_name.or(master.record_name);
        master.issuing_agency = changes.issuing_agency.or(master.issuing_agency);
        master.legislation = changes.legislation.or(master.legislation);
        master.location = changes.location.or(master.location);
        if !changes.centroid.is_empty() {
            master.centroid = changes.centroid;
        }
        master.date_issued = changes.date_issued.or(master.date_issued);
        master.description = changes.description.or(master.description);
        master.summary = changes.summary.or(master.summary);
        master.outcome_description = changes.outcome_description.or(master.outcome_description);
        if !changes.penalties.is_empty() {
            master.penalties = changes.penalties;
        }
        if changes.issued_to != Default::default() {
            // Re-applying business fields must not clobber the ACL
            let (read, write) = (master.issued_to.read.clone(), master.issued_to.write.clone());
            master.issued_to = changes.issued_to;
            master.issued_to.read = read;
            master.issued_to.write = write;
        }
        master.mine_guid = changes.mine_guid.or(master.mine_guid);
        master.source_system_ref = changes.source_system_ref.or(master.source_system_ref);
        master.date_updated = Some(Utc::now());
        master.updated_by = Some(user.to_string());

        self.replace(&master).await?;
        Ok(master)
    }

    /// Attach a document to a master record
    ///
    /// Documents are owned exclusively by the master; flavour records
    /// reference the same ids.
    pub async fn attach_document(
        &self,
        master_id: Uuid,
        file_name: &str,
        url: Option<String>,
        key: Option<String>,
        user: &str,
    ) -> Result<DocumentRecord> {
        let mut master = self.load_master(master_id).await?;

        let document = DocumentRecord {
            id: Uuid::new_v4(),
            schema_name: DocumentRecord::SCHEMA_NAME.to_string(),
            read: master.read.clone(),
            write: master.write.clone(),
            file_name: file_name.to_string(),
            url,
            key,
            master: master_id,
            date_added: Some(Utc::now()),
            added_by: Some(user.to_string()),
        };

        self.store.insert(&document.to_doc()?).await?;

        master.documents.push(document.id);
        master.date_updated = Some(Utc::now());
        master.updated_by = Some(user.to_string());
        self.replace(&master).await?;

        Ok(document)
    }

    /// Publish a master's flavour for one audience
    ///
    /// Creates the flavour from the master when it does not exist yet;
    /// otherwise conditionally adds `'public'` to its `read` array.
    /// Also syncs the master's denormalized `is<Audience>Published`
    /// flag, which must never disagree with the flavour's `read` array.
    pub async fn publish(
        &self,
        master_id: Uuid,
        audience: Audience,
        user: &str,
        user_roles: &[String],
    ) -> Result<PublishOutcome> {
        let mut master = self.load_master(master_id).await?;
        let now = Utc::now();

        match self.find_flavour(&master, audience).await? {
            None => {
                // NotElected → Published: derive the flavour from the
                // master via the ACL policy
                let mut flavour = derive_flavour(&master, audience);
                let flavour_acl =
                    acl::roles_for_audience(user_roles, master.schema_name.kind, audience);
                acl::apply_to_record(&mut flavour, &flavour_acl);
                flavour.read.push(PUBLIC.to_string());
                flavour.date_published = Some(now);
                flavour.published_by = Some(user.to_string());
                flavour.date_added = Some(now);
                flavour.added_by = Some(user.to_string());

                self.store.insert(&flavour.to_doc()?).await?;

                master.flavour_records.push(flavour.id);
                master.set_published_flag(audience, true);
                master.date_updated = Some(now);
                master.updated_by = Some(user.to_string());
                self.replace(&master).await?;

                tracing::info!(
                    master = %master_id,
                    flavour = %flavour.id,
                    audience = %audience,
                    "Created and published flavour"
                );
                Ok(PublishOutcome::Published(flavour))
            }
            Some(mut flavour) => {
                if flavour.is_public() {
                    return Ok(PublishOutcome::AlreadyPublished);
                }

                flavour.read.push(PUBLIC.to_string());
                flavour.date_published = Some(now);
                flavour.published_by = Some(user.to_string());
                flavour.date_updated = Some(now);
                flavour.updated_by = Some(user.to_string());

                // Conditional update: only wins if 'public' is still
                // absent at write time
                let guard = json!({
                    "_id": flavour.id.to_string(),
                    "read": { "$ne": PUBLIC },
                });
                let matched = self.store.update_one(&guard, &flavour.to_doc()?).await?;
                if matched == 0 {
                    // A concurrent publish got there first
                    return Ok(PublishOutcome::AlreadyPublished);
                }

                master.set_published_flag(audience, true);
                master.date_updated = Some(now);
                master.updated_by = Some(user.to_string());
                self.replace(&master).await?;

                tracing::info!(
                    master = %master_id,
                    flavour = %flavour.id,
                    audience = %audience,
                    "Published flavour"
                );
                Ok(PublishOutcome::Published(flavour))
            }
        }
    }

    /// Unpublish a master's flavour for one audience
    ///
    /// Removes `'public'` from the flavour's `read` array without
    /// deleting the flavour, so a later republish restores it without
    /// re-derivation.
    pub async fn unpublish(
        &self,
        master_id: Uuid,
        audience: Audience,
        user: &str,
    ) -> Result<UnpublishOutcome> {
        let mut master = self.load_master(master_id).await?;
        let now = Utc::now();

        let Some(mut flavour) = self.find_flavour(&master, audience).await? else {
            return Err(Error::NotFound(format!(
                "Master {} has no {} flavour",
                master_id, audience
            )));
        };

        if !flavour.is_public() {
            return Ok(UnpublishOutcome::AlreadyUnpublished);
        }

        flavour.read.retain(|r| r != PUBLIC);
        flavour.date_updated = Some(now);
        flavour.updated_by = Some(user.to_string());

        // Mirror guard of publish: only wins while 'public' is present
        let guard = json!({
            "_id": flavour.id.to_string(),
            "read": PUBLIC,
        });
        let matched = self.store.update_one(&guard, &flavour.to_doc()?).await?;
        if matched == 0 {
            return Ok(UnpublishOutcome::AlreadyUnpublished);
        }

        master.set_published_flag(audience, false);
        master.date_updated = Some(now);
        master.updated_by = Some(user.to_string());
        self.replace(&master).await?;

        tracing::info!(
            master = %master_id,
            flavour = %flavour.id,
            audience = %audience,
            "Unpublished flavour"
        );
        Ok(UnpublishOutcome::Unpublished(flavour))
    }

    /// Load a master record by id
    pub async fn load_master(&self, master_id: Uuid) -> Result<RegulatoryRecord> {
        let docs = self
            .store
            .find(&json!({ "_id": master_id.to_string() }))
            .await?;
        let doc = docs
            .first()
            .ok_or_else(|| Error::NotFound(format!("Master record {}", master_id)))?;
        let record = RegulatoryRecord::from_doc(doc)?;
        if !record.schema_name.is_master() {
            return Err(Error::InvalidInput(format!(
                "{} is a flavour record, not a master",
                master_id
            )));
        }
        Ok(record)
    }

    /// The master's flavour for one audience, if elected
    pub async fn find_flavour(
        &self,
        master: &RegulatoryRecord,
        audience: Audience,
    ) -> Result<Option<RegulatoryRecord>> {
        let schema = SchemaName::flavour(master.schema_name.kind, audience);
        let docs = self
            .store
            .find(&json!({
                "_schemaName": schema.to_string(),
                "_master": master.id.to_string(),
            }))
            .await?;
        docs.first().map(RegulatoryRecord::from_doc).transpose()
    }

    async fn replace(&self, record: &RegulatoryRecord) -> Result<()> {
        let filter = json!({ "_id": record.id.to_string() });
        let matched = self.store.update_one(&filter, &record.to_doc()?).await?;
        if matched == 0 {
            return Err(Error::NotFound(format!("Record {}", record.id)));
        }
        Ok(())
    }
}

/// Project a master into a fresh flavour record for one audience
///
/// Copies the business fields and document references; ACL, publication
/// metadata, and audit fields are filled in by the caller.
fn derive_flavour(master: &RegulatoryRecord, audience: Audience) -> RegulatoryRecord {
    let mut flavour = master.clone();
    flavour.id = Uuid::new_v4();
    flavour.schema_name = SchemaName::flavour(master.schema_name.kind, audience);
    flavour.read = vec![];
    flavour.write = vec![];
    flavour.flavour_records = vec![];
    flavour.master = Some(master.id);
    flavour.is_nrced_published = false;
    flavour.is_lng_published = false;
    flavour.is_bcmi_published = false;
    flavour.date_published = None;
    flavour.published_by = None;
    flavour.date_added = None;
    flavour.added_by = None;
    flavour.date_updated = None;
    flavour.updated_by = None;
    flavour
}
