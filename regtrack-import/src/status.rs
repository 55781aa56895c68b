//! Import run status
//!
//! An explicit accumulator folded over per-row outcomes. The pipeline
//! never mutates shared status across in-flight rows; each row
//! resolves to a [`RowOutcome`] and a single aggregation point folds
//! them in, so raising batch concurrency cannot introduce status
//! races.

/// Failure of one CSV row; the rest of the batch continues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// Zero-based row index within the run
    pub row_index: usize,
    /// Natural key of the row, when it could be extracted
    pub source_ref_id: Option<String>,
    pub message: String,
}

/// Outcome of processing one row
#[derive(Debug)]
pub enum RowOutcome {
    Processed,
    Failed(RowFailure),
}

/// Final (and mid-run) status of an import run; the pipeline's only
/// return value and the audit trail of record
#[derive(Debug, Clone, Default)]
pub struct ImportStatus {
    pub items_processed: usize,
    pub item_total: usize,
    /// One entry per failed row
    pub individual_record_status: Vec<RowFailure>,
    /// Human-readable summary set when the run finishes
    pub message: Option<String>,
    /// Fatal error outside the per-row boundary; set means the run
    /// stopped early
    pub error: Option<String>,
}

impl ImportStatus {
    pub fn new(item_total: usize) -> Self {
        Self {
            item_total,
            ..Self::default()
        }
    }

    /// Fold one row outcome into the accumulator
    pub fn fold(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Processed => self.items_processed += 1,
            RowOutcome::Failed(failure) => self.individual_record_status.push(failure),
        }
    }

    /// Whether every row processed cleanly
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.individual_record_status.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_counts_and_failures() {
        let mut status = ImportStatus::new(3);
        status.fold(RowOutcome::Processed);
        status.fold(RowOutcome::Failed(RowFailure {
            row_index: 1,
            source_ref_id: Some("C-2".to_string()),
            message: "missing date".to_string(),
        }));
        status.fold(RowOutcome::Processed);

        assert_eq!(status.items_processed, 2);
        assert_eq!(status.item_total, 3);
        assert_eq!(status.individual_record_status.len(), 1);
        assert_eq!(status.individual_record_status[0].row_index, 1);
        assert!(!status.is_clean());
    }
}
