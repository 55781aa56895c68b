//! COORS (court operations) transformer
//!
//! COORS extracts mix row types: most rows follow the requested import
//! kind, but rows whose enforcement outcome code marks a court
//! conviction are retyped to `CourtConviction` regardless of the
//! requested kind. Conviction rows are also serialized by the runner
//! (never batched): a case's later penalty rows append onto the record
//! created by its first row, and batching would let them race the
//! create.

use regtrack_common::models::{IssuedTo, NewRecord, Penalty, RegulatoryRecord};
use regtrack_common::roles::RecordKind;
use regtrack_common::Result;

use super::agency::parse_date;
use super::{optional_column, require_column, CsvRow, RecordTransformer};

/// Enforcement outcome codes that force the court-conviction record
/// kind
const CONVICTION_OUTCOME_CODES: [&str; 3] = ["GTPS", "GTPL", "CONV"];

pub struct CoorsTransformer {
    requested: RecordKind,
}

impl CoorsTransformer {
    pub fn new(requested: RecordKind) -> Self {
        Self { requested }
    }

    fn effective_kind(&self, row: &CsvRow) -> RecordKind {
        let outcome = row.get("enforcement_outcome").map(String::as_str);
        match outcome {
            Some(code) if CONVICTION_OUTCOME_CODES.contains(&code) => RecordKind::CourtConviction,
            _ => self.requested,
        }
    }
}

impl RecordTransformer for CoorsTransformer {
    fn source_ref_id(&self, row: &CsvRow) -> Result<String> {
        let case = require_column(row, "case_number")?;
        let count = require_column(row, "count_number")?;
        Ok(format!("{}-{}", case, count))
    }

    fn transform(&self, row: &CsvRow) -> Result<(RecordKind, NewRecord)> {
        let kind = self.effective_kind(row);

        let record = NewRecord {
            record_name: optional_column(row, "description")
                .or_else(|| Some(format!("Case {}", require_column(row, "case_number").ok()?))),
            issuing_agency: Some("Court".to_string()),
            legislation: None,
            location: optional_column(row, "court_location"),
            centroid: vec![],
            date_issued: parse_date(row, "date_sentenced")?,
            description: optional_column(row, "description"),
            summary: optional_column(row, "act_description"),
            outcome_description: optional_column(row, "enforcement_outcome"),
            penalties: parse_penalties(row),
            issued_to: IssuedTo {
                first_name: optional_column(row, "first_name"),
                last_name: optional_column(row, "last_name"),
                company_name: optional_column(row, "business_name"),
                entity_type: match optional_column(row, "business_name") {
                    Some(_) => Some("Company".to_string()),
                    None => Some("Individual".to_string()),
                },
                ..IssuedTo::default()
            },
            mine_guid: None,
            source_system_ref: Some(super::DatasourceKind::Coors.to_string()),
            source_ref_id: Some(self.source_ref_id(row)?),
        };

        Ok((kind, record))
    }

    fn must_serialize(&self, row: &CsvRow) -> bool {
        self.effective_kind(row) == RecordKind::CourtConviction
    }

    /// Conviction penalty rows accumulate: merge keeps the existing
    /// penalties and appends the incoming ones
    fn merge_into(&self, existing: &RegulatoryRecord, mut incoming: NewRecord) -> NewRecord {
        let mut penalties = existing.penalties.clone();
        penalties.append(&mut incoming.penalties);
        incoming.penalties = penalties;
        incoming
    }
}

fn parse_penalties(row: &CsvRow) -> Vec<Penalty> {
    let mut penalties = Vec::new();
    if let Some(fine) = optional_column(row, "fine_amount").and_then(|v| v.parse::<f64>().ok()) {
        penalties.push(Penalty {
            penalty_type: Some("Fined".to_string()),
            penalty_value: Some(fine),
            description: optional_column(row, "penalty_description"),
        });
    }
    if let Some(days) = optional_column(row, "jail_days").and_then(|v| v.parse::<f64>().ok()) {
        penalties.push(Penalty {
            penalty_type: Some("Jail".to_string()),
            penalty_value: Some(days),
            description: Some("Days in custody".to_string()),
        });
    }
    penalties
}
