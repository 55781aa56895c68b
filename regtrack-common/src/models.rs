//! Record models
//!
//! One logical collection holds every record kind, discriminated by
//! `_schemaName`. A [`RegulatoryRecord`] serves both the master document
//! and its audience flavours; which one it is follows from the schema
//! name. Audit fields are set by the lifecycle engine, never by callers.

use crate::roles::{Audience, SchemaName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Entity a record was issued to
///
/// Carries its own `read`/`write` arrays: redaction of the issued-to
/// entity is access-checked independently of the enclosing record, so
/// the ACL policy must populate both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTo {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<DateTime<Utc>>,
}

/// Act/regulation reference of a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legislation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,
}

/// Monetary or other penalty attached to a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One regulatory record document (master or flavour)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulatoryRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "_schemaName")]
    pub schema_name: SchemaName,
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,

    /// Soft-delete flag; boolean-true search filters implicitly add
    /// `active: true`
    #[serde(default = "default_true")]
    pub active: bool,

    // Business fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_agency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legislation: Option<Legislation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub centroid: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_issued: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub penalties: Vec<Penalty>,
    #[serde(default)]
    pub issued_to: IssuedTo,

    /// Document ids owned by the master; flavours reference the same
    /// ids, never separate copies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Uuid>,

    /// Flavour ids elected for this master (masters only)
    #[serde(rename = "_flavourRecords", default, skip_serializing_if = "Vec::is_empty")]
    pub flavour_records: Vec<Uuid>,
    /// Back-reference to the owning master (flavours only)
    #[serde(rename = "_master", default, skip_serializing_if = "Option::is_none")]
    pub master: Option<Uuid>,

    /// Mine this record is attached to (BCMI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mine_guid: Option<String>,

    // Denormalized publication flags, kept in lock-step with the
    // corresponding flavour's read array by the lifecycle engine
    #[serde(default)]
    pub is_nrced_published: bool,
    #[serde(default)]
    pub is_lng_published: bool,
    #[serde(default)]
    pub is_bcmi_published: bool,

    // Source references (import idempotency key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system_ref: Option<String>,
    #[serde(rename = "_sourceRefId", default, skip_serializing_if = "Option::is_none")]
    pub source_ref_id: Option<String>,

    // Publication metadata (flavours only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_by: Option<String>,

    // Audit fields, set by the lifecycle engine only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

fn default_true() -> bool {
    true
}

impl RegulatoryRecord {
    /// Whether `'public'` is present in `read` (the only signal of
    /// public visibility)
    pub fn is_public(&self) -> bool {
        self.read.iter().any(|r| r == crate::roles::PUBLIC)
    }

    /// Read the denormalized publication flag for one audience
    pub fn published_flag(&self, audience: Audience) -> bool {
        match audience {
            Audience::Nrced => self.is_nrced_published,
            Audience::Lng => self.is_lng_published,
            Audience::Bcmi => self.is_bcmi_published,
        }
    }

    /// Set the denormalized publication flag for one audience
    pub fn set_published_flag(&mut self, audience: Audience, value: bool) {
        match audience {
            Audience::Nrced => self.is_nrced_published = value,
            Audience::Lng => self.is_lng_published = value,
            Audience::Bcmi => self.is_bcmi_published = value,
        }
    }

    pub fn to_doc(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_doc(doc: &Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(doc.clone())?)
    }
}

/// Caller-supplied fields for a new master record
///
/// Identity, ACL, and audit fields are filled in by the lifecycle
/// engine.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub record_name: Option<String>,
    pub issuing_agency: Option<String>,
    pub legislation: Option<Legislation>,
    pub location: Option<String>,
    pub centroid: Vec<f64>,
    pub date_issued: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub outcome_description: Option<String>,
    pub penalties: Vec<Penalty>,
    pub issued_to: IssuedTo,
    pub mine_guid: Option<String>,
    pub source_system_ref: Option<String>,
    pub source_ref_id: Option<String>,
}

/// A file or link attached to a master record
///
/// Owned exclusively by the master; flavour records reference the same
/// document ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "_schemaName")]
    pub schema_name: String,
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Object-storage key of the backing blob, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Owning master record
    #[serde(rename = "_master")]
    pub master: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
}

impl DocumentRecord {
    pub const SCHEMA_NAME: &'static str = "Document";

    pub fn to_doc(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_doc(doc: &Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(doc.clone())?)
    }
}

/// Named, ordered grouping of BCMI flavour ids scoped to one mine
///
/// Must never contain the id of a record whose BCMI flavour has been
/// deleted; the cascading delete engine maintains this.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBcmi {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "_schemaName")]
    pub schema_name: String,
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mine_guid: Option<String>,
    /// BCMI flavour record ids, in display order
    #[serde(default)]
    pub records: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
}

impl CollectionBcmi {
    pub const SCHEMA_NAME: &'static str = "CollectionBCMI";

    pub fn to_doc(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_doc(doc: &Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(doc.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{RecordKind, PUBLIC};

    #[test]
    fn test_record_doc_round_trip() {
        let record = RegulatoryRecord {
            id: Uuid::new_v4(),
            schema_name: SchemaName::flavour(RecordKind::Ticket, Audience::Nrced),
            read: vec![PUBLIC.to_string()],
            write: vec!["sysadmin".to_string()],
            active: true,
            record_name: Some("Ticket T-100".to_string()),
            issuing_agency: None,
            legislation: None,
            location: None,
            centroid: vec![],
            date_issued: None,
            description: None,
            summary: None,
            outcome_description: None,
            penalties: vec![],
            issued_to: IssuedTo::default(),
            documents: vec![],
            flavour_records: vec![],
            master: Some(Uuid::new_v4()),
            mine_guid: None,
            is_nrced_published: false,
            is_lng_published: false,
            is_bcmi_published: false,
            source_system_ref: None,
            source_ref_id: None,
            date_published: None,
            published_by: None,
            date_added: None,
            added_by: None,
            date_updated: None,
            updated_by: None,
        };

        let doc = record.to_doc().unwrap();
        assert_eq!(doc["_schemaName"], "TicketNRCED");
        assert_eq!(doc["_id"], record.id.to_string());

        let back = RegulatoryRecord::from_doc(&doc).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.schema_name, record.schema_name);
        assert!(back.is_public());
    }

    #[test]
    fn test_published_flag_accessors() {
        let mut record = RegulatoryRecord::from_doc(&serde_json::json!({
            "_id": Uuid::new_v4().to_string(),
            "_schemaName": "Order",
        }))
        .unwrap();

        assert!(!record.published_flag(Audience::Bcmi));
        record.set_published_flag(Audience::Bcmi, true);
        assert!(record.is_bcmi_published);
        assert!(!record.is_nrced_published);
    }
}
