//! Role constants, audiences, and record kinds
//!
//! Every record carries `read`/`write` role arrays. Presence of
//! [`PUBLIC`] in `read` is the only signal of public visibility.
//! Schema-name strings are never switched on directly; the closed
//! [`Audience`] and [`RecordKind`] enums are the single source of truth,
//! so an unhandled kind is a compile error rather than a runtime throw.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role that can read and write everything, always present in both arrays
pub const SYSADMIN: &str = "sysadmin";
/// Pseudo-role marking a record as publicly visible
pub const PUBLIC: &str = "public";
/// NRCED site administrators
pub const ADMIN_NRCED: &str = "admin:nrced";
/// LNG site administrators
pub const ADMIN_LNG: &str = "admin:lng";
/// BCMI site administrators
pub const ADMIN_BCMI: &str = "admin:bcmi";

/// Public-facing audience a record can be projected for
///
/// Doubles as the flavour type: one flavour record exists per
/// (master, audience) pair at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    Nrced,
    Lng,
    Bcmi,
}

impl Audience {
    /// All audiences, in schema-suffix order
    pub const ALL: [Audience; 3] = [Audience::Nrced, Audience::Lng, Audience::Bcmi];

    /// Schema name suffix for flavour records of this audience
    pub fn suffix(&self) -> &'static str {
        match self {
            Audience::Nrced => "NRCED",
            Audience::Lng => "LNG",
            Audience::Bcmi => "BCMI",
        }
    }

    /// Admin role that manages this audience
    pub fn admin_role(&self) -> &'static str {
        match self {
            Audience::Nrced => ADMIN_NRCED,
            Audience::Lng => ADMIN_LNG,
            Audience::Bcmi => ADMIN_BCMI,
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Audience {
    type Err = Error;

    /// Parse a flavour type. Unsupported types are a hard error: an
    /// unknown flavour at this boundary is a programming error, not a
    /// runtime condition to recover from.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nrced" => Ok(Audience::Nrced),
            "lng" => Ok(Audience::Lng),
            "bcmi" => Ok(Audience::Bcmi),
            other => Err(Error::InvalidInput(format!(
                "Unsupported flavour type: {}",
                other
            ))),
        }
    }
}

/// The supported regulatory record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Order,
    Inspection,
    Ticket,
    Permit,
    Certificate,
    Agreement,
    SelfReport,
    RestorativeJustice,
    AdministrativePenalty,
    AdministrativeSanction,
    Warning,
    ConstructionPlan,
    ManagementPlan,
    CourtConviction,
    AnnualReport,
    Correspondence,
    DamSafetyInspection,
    Report,
}

impl RecordKind {
    /// Master schema name for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Order => "Order",
            RecordKind::Inspection => "Inspection",
            RecordKind::Ticket => "Ticket",
            RecordKind::Permit => "Permit",
            RecordKind::Certificate => "Certificate",
            RecordKind::Agreement => "Agreement",
            RecordKind::SelfReport => "SelfReport",
            RecordKind::RestorativeJustice => "RestorativeJustice",
            RecordKind::AdministrativePenalty => "AdministrativePenalty",
            RecordKind::AdministrativeSanction => "AdministrativeSanction",
            RecordKind::Warning => "Warning",
            RecordKind::ConstructionPlan => "ConstructionPlan",
            RecordKind::ManagementPlan => "ManagementPlan",
            RecordKind::CourtConviction => "CourtConviction",
            RecordKind::AnnualReport => "AnnualReport",
            RecordKind::Correspondence => "Correspondence",
            RecordKind::DamSafetyInspection => "DamSafetyInspection",
            RecordKind::Report => "Report",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Order" => Ok(RecordKind::Order),
            "Inspection" => Ok(RecordKind::Inspection),
            "Ticket" => Ok(RecordKind::Ticket),
            "Permit" => Ok(RecordKind::Permit),
            "Certificate" => Ok(RecordKind::Certificate),
            "Agreement" => Ok(RecordKind::Agreement),
            "SelfReport" => Ok(RecordKind::SelfReport),
            "RestorativeJustice" => Ok(RecordKind::RestorativeJustice),
            "AdministrativePenalty" => Ok(RecordKind::AdministrativePenalty),
            "AdministrativeSanction" => Ok(RecordKind::AdministrativeSanction),
            "Warning" => Ok(RecordKind::Warning),
            "ConstructionPlan" => Ok(RecordKind::ConstructionPlan),
            "ManagementPlan" => Ok(RecordKind::ManagementPlan),
            "CourtConviction" => Ok(RecordKind::CourtConviction),
            "AnnualReport" => Ok(RecordKind::AnnualReport),
            "Correspondence" => Ok(RecordKind::Correspondence),
            "DamSafetyInspection" => Ok(RecordKind::DamSafetyInspection),
            "Report" => Ok(RecordKind::Report),
            other => Err(Error::InvalidInput(format!(
                "Unknown record kind: {}",
                other
            ))),
        }
    }
}

/// Schema name discriminator: `<Kind>` for masters, `<Kind><Audience>`
/// for flavour records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaName {
    pub kind: RecordKind,
    pub audience: Option<Audience>,
}

impl SchemaName {
    pub fn master(kind: RecordKind) -> Self {
        Self {
            kind,
            audience: None,
        }
    }

    pub fn flavour(kind: RecordKind, audience: Audience) -> Self {
        Self {
            kind,
            audience: Some(audience),
        }
    }

    pub fn is_master(&self) -> bool {
        self.audience.is_none()
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.audience {
            None => write!(f, "{}", self.kind),
            Some(audience) => write!(f, "{}{}", self.kind, audience.suffix()),
        }
    }
}

impl FromStr for SchemaName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        for audience in Audience::ALL {
            if let Some(prefix) = s.strip_suffix(audience.suffix()) {
                if let Ok(kind) = RecordKind::from_str(prefix) {
                    return Ok(SchemaName::flavour(kind, audience));
                }
            }
        }
        RecordKind::from_str(s).map(SchemaName::master)
    }
}

impl Serialize for SchemaName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SchemaName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
