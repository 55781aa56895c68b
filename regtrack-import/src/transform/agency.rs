//! Generic agency CSV transformer
//!
//! Maps the common agency export columns onto record business fields.
//! The record kind is fixed per run; each row's `record_id` column is
//! the idempotency key.

use chrono::{DateTime, NaiveDate, Utc};
use regtrack_common::models::{IssuedTo, Legislation, NewRecord, Penalty};
use regtrack_common::roles::RecordKind;
use regtrack_common::{Error, Result};

use super::{optional_column, require_column, CsvRow, RecordTransformer};

pub struct AgencyCsvTransformer {
    kind: RecordKind,
}

impl AgencyCsvTransformer {
    pub fn new(kind: RecordKind) -> Self {
        Self { kind }
    }
}

impl RecordTransformer for AgencyCsvTransformer {
    fn source_ref_id(&self, row: &CsvRow) -> Result<String> {
        Ok(require_column(row, "record_id")?.to_string())
    }

    fn transform(&self, row: &CsvRow) -> Result<(RecordKind, NewRecord)> {
        let record = NewRecord {
            record_name: optional_column(row, "record_name"),
            issuing_agency: optional_column(row, "issuing_agency"),
            legislation: parse_legislation(row),
            location: optional_column(row, "location"),
            centroid: parse_centroid(row)?,
            date_issued: parse_date(row, "date_issued")?,
            description: optional_column(row, "description"),
            summary: optional_column(row, "summary"),
            outcome_description: optional_column(row, "outcome_description"),
            penalties: parse_penalty(row)?,
            issued_to: parse_issued_to(row),
            mine_guid: optional_column(row, "mine_guid"),
            source_system_ref: Some(super::DatasourceKind::AgencyCsv.to_string()),
            source_ref_id: Some(self.source_ref_id(row)?),
        };
        Ok((self.kind, record))
    }
}

fn parse_legislation(row: &CsvRow) -> Option<Legislation> {
    let act = optional_column(row, "act");
    let regulation = optional_column(row, "regulation");
    let section = optional_column(row, "section");
    if act.is_none() && regulation.is_none() && section.is_none() {
        return None;
    }
    Some(Legislation {
        act,
        regulation,
        section,
        sub_section: optional_column(row, "sub_section"),
        paragraph: optional_column(row, "paragraph"),
    })
}

fn parse_issued_to(row: &CsvRow) -> IssuedTo {
    IssuedTo {
        company_name: optional_column(row, "company_name"),
        first_name: optional_column(row, "first_name"),
        last_name: optional_column(row, "last_name"),
        entity_type: optional_column(row, "entity_type"),
        ..IssuedTo::default()
    }
}

fn parse_penalty(row: &CsvRow) -> Result<Vec<Penalty>> {
    let Some(raw) = optional_column(row, "penalty_amount") else {
        return Ok(vec![]);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| Error::InvalidInput(format!("Invalid penalty_amount '{}'", raw)))?;
    Ok(vec![Penalty {
        penalty_type: optional_column(row, "penalty_type").or(Some("Fined".to_string())),
        penalty_value: Some(value),
        description: optional_column(row, "penalty_description"),
    }])
}

fn parse_centroid(row: &CsvRow) -> Result<Vec<f64>> {
    let (Some(lon), Some(lat)) = (
        optional_column(row, "longitude"),
        optional_column(row, "latitude"),
    ) else {
        return Ok(vec![]);
    };
    let lon = lon
        .parse::<f64>()
        .map_err(|_| Error::InvalidInput(format!("Invalid longitude '{}'", lon)))?;
    let lat = lat
        .parse::<f64>()
        .map_err(|_| Error::InvalidInput(format!("Invalid latitude '{}'", lat)))?;
    Ok(vec![lon, lat])
}

pub(crate) fn parse_date(row: &CsvRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = optional_column(row, column) else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    let day = raw
        .parse::<NaiveDate>()
        .map_err(|_| Error::InvalidInput(format!("Invalid date '{}' in column '{}'", raw, column)))?;
    Ok(day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(entries: &[(&str, &str)]) -> CsvRow {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_transform_full_row() {
        let transformer = AgencyCsvTransformer::new(RecordKind::Order);
        let row = row(&[
            ("record_id", "O-2020-001"),
            ("record_name", "Stop work order"),
            ("issuing_agency", "AGRI"),
            ("act", "Integrated Pest Management Act"),
            ("date_issued", "2020-03-15"),
            ("company_name", "Acme Forestry Ltd."),
            ("penalty_amount", "2500"),
            ("longitude", "-123.37"),
            ("latitude", "48.42"),
        ]);

        let (kind, record) = transformer.transform(&row).unwrap();
        assert_eq!(kind, RecordKind::Order);
        assert_eq!(record.record_name.as_deref(), Some("Stop work order"));
        assert_eq!(record.source_ref_id.as_deref(), Some("O-2020-001"));
        assert_eq!(record.centroid, vec![-123.37, 48.42]);
        assert_eq!(record.penalties[0].penalty_value, Some(2500.0));
        assert_eq!(
            record.issued_to.company_name.as_deref(),
            Some("Acme Forestry Ltd.")
        );
        assert_eq!(
            record.date_issued.unwrap().to_rfc3339(),
            "2020-03-15T00:00:00+00:00"
        );
    }

    #[test]
    fn test_missing_natural_key_is_error() {
        let transformer = AgencyCsvTransformer::new(RecordKind::Order);
        let row = row(&[("record_name", "No id")]);
        assert!(transformer.transform(&row).is_err());
    }

    #[test]
    fn test_bad_penalty_is_error() {
        let transformer = AgencyCsvTransformer::new(RecordKind::Ticket);
        let row = row(&[("record_id", "T-1"), ("penalty_amount", "lots")]);
        assert!(transformer.transform(&row).is_err());
    }
}
