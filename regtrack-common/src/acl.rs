//! ACL policy
//!
//! Pure role computation for master and flavour records. No I/O and no
//! clock access, so every rule is unit-testable in isolation. The
//! lifecycle engine is the only caller that applies the result to
//! records.

use crate::models::RegulatoryRecord;
use crate::roles::{Audience, RecordKind, SYSADMIN};

/// Computed `read`/`write` role arrays for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub read: Vec<String>,
    pub write: Vec<String>,
}

/// Per-kind co-editor roles (data, not logic)
///
/// Agency-specific admin roles allowed to co-edit records of a given
/// kind, on top of the audience admin role.
pub fn additional_roles(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Order
        | RecordKind::Inspection
        | RecordKind::AdministrativePenalty
        | RecordKind::CourtConviction => &["admin:flnr-nro", "admin:env-epd"],
        RecordKind::Ticket | RecordKind::Warning | RecordKind::RestorativeJustice => {
            &["admin:env-cos"]
        }
        RecordKind::Permit | RecordKind::Certificate | RecordKind::Agreement => {
            &["admin:agri"]
        }
        RecordKind::SelfReport
        | RecordKind::AdministrativeSanction
        | RecordKind::ConstructionPlan
        | RecordKind::ManagementPlan
        | RecordKind::AnnualReport
        | RecordKind::Correspondence
        | RecordKind::DamSafetyInspection
        | RecordKind::Report => &[],
    }
}

/// Compute the role arrays for a record targeted at one audience
///
/// `sysadmin` is always present in both arrays. The audience's admin
/// role is added only when the acting user actually holds it. All
/// configured additional roles for the kind are added to both arrays.
pub fn roles_for_audience(
    acting_user_roles: &[String],
    kind: RecordKind,
    audience: Audience,
) -> Acl {
    let mut roles: Vec<String> = vec![SYSADMIN.to_string()];

    let admin_role = audience.admin_role();
    if acting_user_roles.iter().any(|r| r == admin_role) {
        roles.push(admin_role.to_string());
    }

    for role in additional_roles(kind) {
        if !roles.iter().any(|r| r == role) {
            roles.push((*role).to_string());
        }
    }

    Acl {
        read: roles.clone(),
        write: roles,
    }
}

/// Roles for the master (admin-audience) representation of a record
///
/// Masters are editable by any audience admin the acting user holds,
/// plus the kind's additional roles.
pub fn roles_for_master(acting_user_roles: &[String], kind: RecordKind) -> Acl {
    let mut roles: Vec<String> = vec![SYSADMIN.to_string()];

    for audience in Audience::ALL {
        let admin_role = audience.admin_role();
        if acting_user_roles.iter().any(|r| r == admin_role) {
            roles.push(admin_role.to_string());
        }
    }

    for role in additional_roles(kind) {
        if !roles.iter().any(|r| r == role) {
            roles.push((*role).to_string());
        }
    }

    Acl {
        read: roles.clone(),
        write: roles,
    }
}

/// Apply an ACL to a record and its nested issued-to entity
///
/// The nested duplication is a hard requirement: `issuedTo` is
/// access-checked independently for redaction, so it carries the same
/// role arrays as the enclosing record.
pub fn apply_to_record(record: &mut RegulatoryRecord, acl: &Acl) {
    record.read = acl.read.clone();
    record.write = acl.write.clone();
    record.issued_to.read = acl.read.clone();
    record.issued_to.write = acl.write.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssuedTo;
    use crate::roles::{ADMIN_LNG, ADMIN_NRCED};

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sysadmin_always_present() {
        let acl = roles_for_audience(&[], RecordKind::Report, Audience::Lng);
        assert_eq!(acl.read, vec![SYSADMIN.to_string()]);
        assert_eq!(acl.write, vec![SYSADMIN.to_string()]);
    }

    #[test]
    fn test_audience_admin_only_when_held() {
        let acl = roles_for_audience(&roles(&[ADMIN_NRCED]), RecordKind::Report, Audience::Nrced);
        assert!(acl.read.contains(&ADMIN_NRCED.to_string()));
        assert!(acl.write.contains(&ADMIN_NRCED.to_string()));

        // Holding the NRCED role gives nothing on an LNG flavour
        let acl = roles_for_audience(&roles(&[ADMIN_NRCED]), RecordKind::Report, Audience::Lng);
        assert!(!acl.read.contains(&ADMIN_NRCED.to_string()));
        assert!(!acl.read.contains(&ADMIN_LNG.to_string()));
    }

    #[test]
    fn test_additional_roles_land_in_record_and_issued_to() {
        // Order has admin:flnr-nro configured as an additional role
        let acl = roles_for_audience(
            &roles(&["admin:flnr-nro"]),
            RecordKind::Order,
            Audience::Nrced,
        );
        assert!(acl.read.contains(&"admin:flnr-nro".to_string()));
        assert!(acl.write.contains(&"admin:flnr-nro".to_string()));

        let mut record = crate::models::RegulatoryRecord::from_doc(&serde_json::json!({
            "_id": uuid::Uuid::new_v4().to_string(),
            "_schemaName": "OrderNRCED",
        }))
        .unwrap();
        record.issued_to = IssuedTo {
            company_name: Some("Acme Forestry Ltd.".to_string()),
            ..IssuedTo::default()
        };

        apply_to_record(&mut record, &acl);

        assert!(record.read.contains(&"admin:flnr-nro".to_string()));
        assert!(record.write.contains(&"admin:flnr-nro".to_string()));
        // Nested duplication into the issued-to entity
        assert!(record.issued_to.read.contains(&"admin:flnr-nro".to_string()));
        assert!(record.issued_to.write.contains(&"admin:flnr-nro".to_string()));
    }

    #[test]
    fn test_master_roles_cover_all_held_audiences() {
        let acl = roles_for_master(&roles(&[ADMIN_NRCED, ADMIN_LNG]), RecordKind::Ticket);
        assert!(acl.write.contains(&ADMIN_NRCED.to_string()));
        assert!(acl.write.contains(&ADMIN_LNG.to_string()));
        assert!(!acl.write.contains(&crate::roles::ADMIN_BCMI.to_string()));
        // Ticket additional role
        assert!(acl.write.contains(&"admin:env-cos".to_string()));
    }

    #[test]
    fn test_deterministic() {
        let user = roles(&[ADMIN_NRCED, "admin:flnr-nro"]);
        let a = roles_for_audience(&user, RecordKind::Order, Audience::Nrced);
        let b = roles_for_audience(&user, RecordKind::Order, Audience::Nrced);
        assert_eq!(a, b);
    }
}
