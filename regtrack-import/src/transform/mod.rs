//! Row transformers
//!
//! One transformer per (datasource, record kind) pair, registered in a
//! closed registry built at startup. The registry is populated by an
//! exhaustive match over [`DatasourceKind`], so adding a datasource
//! without wiring its transformers is a compile error rather than a
//! runtime throw; an unresolvable (datasource, kind) pair remains a
//! configuration error that aborts the whole run.

pub mod agency;
pub mod coors;

use regtrack_common::models::{NewRecord, RegulatoryRecord};
use regtrack_common::roles::RecordKind;
use regtrack_common::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use agency::AgencyCsvTransformer;
pub use coors::CoorsTransformer;

/// One CSV row, keyed by header name
pub type CsvRow = HashMap<String, String>;

/// The supported external datasources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasourceKind {
    /// Generic agency CSV exports
    AgencyCsv,
    /// Court Operations (COORS) extracts
    Coors,
}

impl DatasourceKind {
    pub const ALL: [DatasourceKind; 2] = [DatasourceKind::AgencyCsv, DatasourceKind::Coors];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasourceKind::AgencyCsv => "agency-csv",
            DatasourceKind::Coors => "coors",
        }
    }
}

impl fmt::Display for DatasourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "agency-csv" => Ok(DatasourceKind::AgencyCsv),
            "coors" => Ok(DatasourceKind::Coors),
            other => Err(Error::InvalidInput(format!(
                "Unknown datasource: {}",
                other
            ))),
        }
    }
}

/// Per-datasource row transformation
pub trait RecordTransformer: Send + Sync {
    /// Natural key of a row (becomes `_sourceRefId`, the import
    /// idempotency key)
    fn source_ref_id(&self, row: &CsvRow) -> Result<String>;

    /// Transform one row into its effective record kind and business
    /// fields. Datasources may retype a row regardless of the
    /// requested import kind (COORS court convictions).
    fn transform(&self, row: &CsvRow) -> Result<(RecordKind, NewRecord)>;

    /// Rows that must be processed serially instead of batched,
    /// because later rows append onto the record created by earlier
    /// ones
    fn must_serialize(&self, _row: &CsvRow) -> bool {
        false
    }

    /// Merge incoming fields onto an existing record found by natural
    /// key. The default replaces fields wholesale; datasources with
    /// append semantics override this.
    fn merge_into(&self, _existing: &RegulatoryRecord, incoming: NewRecord) -> NewRecord {
        incoming
    }
}

/// Closed map of (datasource, record kind) to transformer, built once
/// at startup
pub struct TransformerRegistry {
    map: HashMap<(DatasourceKind, RecordKind), Arc<dyn RecordTransformer>>,
}

impl TransformerRegistry {
    /// Register every supported transformer
    pub fn bootstrap() -> Self {
        let mut map: HashMap<(DatasourceKind, RecordKind), Arc<dyn RecordTransformer>> =
            HashMap::new();

        for datasource in DatasourceKind::ALL {
            match datasource {
                DatasourceKind::AgencyCsv => {
                    for kind in [
                        RecordKind::Order,
                        RecordKind::Inspection,
                        RecordKind::Ticket,
                        RecordKind::Warning,
                        RecordKind::AdministrativePenalty,
                    ] {
                        map.insert(
                            (datasource, kind),
                            Arc::new(AgencyCsvTransformer::new(kind)),
                        );
                    }
                }
                DatasourceKind::Coors => {
                    for kind in [RecordKind::Ticket, RecordKind::CourtConviction] {
                        map.insert((datasource, kind), Arc::new(CoorsTransformer::new(kind)));
                    }
                }
            }
        }

        Self { map }
    }

    /// Build a registry from explicit entries (tests)
    pub fn from_entries(
        entries: Vec<((DatasourceKind, RecordKind), Arc<dyn RecordTransformer>)>,
    ) -> Self {
        Self {
            map: entries.into_iter().collect(),
        }
    }

    /// Resolve the transformer for a run; missing configuration is a
    /// hard error that aborts the whole run
    pub fn resolve(
        &self,
        datasource: DatasourceKind,
        kind: RecordKind,
    ) -> Result<Arc<dyn RecordTransformer>> {
        self.map.get(&(datasource, kind)).cloned().ok_or_else(|| {
            Error::Config(format!(
                "No transformer registered for datasource {} and record kind {}",
                datasource, kind
            ))
        })
    }
}

/// Required column access with a per-row error message
pub(crate) fn require_column<'a>(row: &'a CsvRow, column: &str) -> Result<&'a str> {
    row.get(column)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("Row is missing column '{}'", column)))
}

pub(crate) fn optional_column(row: &CsvRow, column: &str) -> Option<String> {
    row.get(column).filter(|v| !v.is_empty()).cloned()
}
