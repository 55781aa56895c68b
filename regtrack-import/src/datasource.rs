//! Import runner
//!
//! One [`DataSource`] owns one import run: an audit task handle, the
//! acting user's verified roles, a record-kind selector, and the raw
//! CSV rows. Rows are processed with bounded concurrency: an in-flight
//! batch accumulates up to the configured batch size and is awaited
//! before the next batch starts. Row order across batches is
//! sequential; order within a batch is unspecified, which is safe
//! because every row operates on a distinct natural key — except
//! serialized datasource subtypes (COORS court convictions), which are
//! awaited inline so append rows cannot race the create.
//!
//! One bad row never aborts a run: per-row errors fold into the status
//! accumulator and processing continues. Errors outside the per-row
//! boundary (unresolvable transformer, audit sink failure) stop the
//! run and land in `status.error`.

use futures::future::join_all;
use regtrack_common::models::RegulatoryRecord;
use regtrack_common::roles::RecordKind;
use regtrack_common::{Error, Result};
use regtrack_records::lifecycle::RecordLifecycle;
use regtrack_records::store::RecordStore;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditSink, TaskUpdate};
use crate::status::{ImportStatus, RowFailure, RowOutcome};
use crate::transform::{CsvRow, DatasourceKind, RecordTransformer, TransformerRegistry};

/// One CSV import run
pub struct DataSource {
    task_id: Uuid,
    user: String,
    user_roles: Vec<String>,
    datasource: DatasourceKind,
    kind: RecordKind,
    rows: Vec<CsvRow>,
    batch_size: usize,
    store: Arc<dyn RecordStore>,
    lifecycle: RecordLifecycle,
    audit: Arc<dyn AuditSink>,
    registry: TransformerRegistry,
}

impl DataSource {
    pub fn new(
        store: Arc<dyn RecordStore>,
        audit: Arc<dyn AuditSink>,
        task_id: Uuid,
        user: &str,
        user_roles: Vec<String>,
        datasource: DatasourceKind,
        kind: RecordKind,
        rows: Vec<CsvRow>,
    ) -> Self {
        Self {
            task_id,
            user: user.to_string(),
            user_roles,
            datasource,
            kind,
            rows,
            batch_size: regtrack_common::config::DEFAULT_CSV_IMPORT_BATCH_SIZE,
            lifecycle: RecordLifecycle::new(store.clone()),
            store,
            audit,
            registry: TransformerRegistry::bootstrap(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_registry(mut self, registry: TransformerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Run the import; the returned status is the run's only output
    /// and its audit trail of record
    pub async fn run(&self) -> ImportStatus {
        let mut status = ImportStatus::new(self.rows.len());

        info!(
            task = %self.task_id,
            datasource = %self.datasource,
            kind = %self.kind,
            rows = self.rows.len(),
            "Starting import run"
        );

        if let Err(e) = self
            .audit
            .update_task_record(self.task_id, &TaskUpdate::total(self.rows.len()))
            .await
        {
            status.error = Some(e.to_string());
            return status;
        }

        if let Err(e) = self.batch_process_records(&mut status).await {
            tracing::error!(task = %self.task_id, error = %e, "Import run stopped");
            status.message = Some("Import stopped early".to_string());
            status.error = Some(e.to_string());
            let _ = self
                .audit
                .update_task_record(
                    self.task_id,
                    &TaskUpdate {
                        error: Some(e.to_string()),
                        ..TaskUpdate::default()
                    },
                )
                .await;
        }

        if status.message.is_none() {
            status.message = Some(format!(
                "Processed {} of {} rows",
                status.items_processed, status.item_total
            ));
        }
        info!(
            task = %self.task_id,
            processed = status.items_processed,
            failed = status.individual_record_status.len(),
            "Import run finished"
        );
        status
    }

    async fn batch_process_records(&self, status: &mut ImportStatus) -> Result<()> {
        // Unresolvable config aborts the whole run
        let transformer = self.registry.resolve(self.datasource, self.kind)?;

        let mut batch = Vec::new();
        for (index, row) in self.rows.iter().enumerate() {
            if transformer.must_serialize(row) {
                // Drain in-flight work first so the serialized row
                // observes every earlier row's writes
                self.flush(&mut batch, status).await?;
                let outcome = self.process_record(index, row, &transformer).await;
                status.fold(outcome);
                self.persist_progress(status).await?;
            } else {
                batch.push(self.process_record(index, row, &transformer));
                if batch.len() >= self.batch_size {
                    self.flush(&mut batch, status).await?;
                }
            }
        }
        self.flush(&mut batch, status).await?;

        Ok(())
    }

    /// Await the in-flight batch, fold its outcomes, persist progress
    async fn flush<F>(&self, batch: &mut Vec<F>, status: &mut ImportStatus) -> Result<()>
    where
        F: Future<Output = RowOutcome>,
    {
        if batch.is_empty() {
            return Ok(());
        }
        for outcome in join_all(batch.drain(..)).await {
            status.fold(outcome);
        }
        self.persist_progress(status).await
    }

    async fn persist_progress(&self, status: &ImportStatus) -> Result<()> {
        self.audit
            .update_task_record(
                self.task_id,
                &TaskUpdate::progress(
                    status.items_processed,
                    status.individual_record_status.len(),
                ),
            )
            .await
    }

    /// Process one row: transform, then find-or-create by natural key.
    /// Every error is captured as a row failure; the batch continues.
    async fn process_record(
        &self,
        index: usize,
        row: &CsvRow,
        transformer: &Arc<dyn RecordTransformer>,
    ) -> RowOutcome {
        match self.try_process(row, transformer).await {
            Ok(()) => RowOutcome::Processed,
            Err(e) => {
                warn!(row = index, error = %e, "Row failed; continuing with batch");
                RowOutcome::Failed(RowFailure {
                    row_index: index,
                    source_ref_id: transformer.source_ref_id(row).ok(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn try_process(
        &self,
        row: &CsvRow,
        transformer: &Arc<dyn RecordTransformer>,
    ) -> Result<()> {
        let (kind, fields) = transformer.transform(row)?;
        let source_ref_id = fields
            .source_ref_id
            .clone()
            .ok_or_else(|| Error::Internal("Transformer produced no source ref id".to_string()))?;

        let existing = self
            .store
            .find(&json!({
                "_schemaName": kind.as_str(),
                "_sourceRefId": source_ref_id,
            }))
            .await?;

        match existing.first() {
            Some(doc) => {
                let record = RegulatoryRecord::from_doc(doc)?;
                let merged = transformer.merge_into(&record, fields);
                self.lifecycle
                    .update_master(record.id, merged, &self.user)
                    .await?;
            }
            None => {
                self.lifecycle
                    .create_master(kind, fields, &self.user, &self.user_roles)
                    .await?;
            }
        }
        Ok(())
    }
}
