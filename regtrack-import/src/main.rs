//! regtrack-import - CSV bulk import runner
//!
//! Reads a CSV export from one of the supported datasources and upserts
//! its rows into the record database. Progress is persisted to the
//! `import_tasks` table as batches complete; the process exit code
//! reflects the run outcome (non-zero when any row failed or the run
//! stopped early).

use anyhow::{Context, Result};
use clap::Parser;
use regtrack_common::config::RegtrackConfig;
use regtrack_common::roles::RecordKind;
use regtrack_import::transform::DatasourceKind;
use regtrack_import::{CsvRow, DataSource, SqliteAuditSink};
use regtrack_records::store::SqliteRecordStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "regtrack-import", about = "Import a datasource CSV into the record database")]
struct Args {
    /// CSV file to import
    #[arg(long)]
    csv: PathBuf,

    /// Datasource the file came from (agency-csv, coors)
    #[arg(long)]
    datasource: DatasourceKind,

    /// Record kind to import the rows as
    #[arg(long)]
    kind: RecordKind,

    /// Config file path (otherwise resolved via REGTRACK_CONFIG and
    /// default locations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Record database path, overriding the configured one
    #[arg(long)]
    db: Option<PathBuf>,

    /// Acting user recorded in the audit fields
    #[arg(long, default_value = "import-task")]
    user: String,

    /// Roles granted to the acting user (repeatable)
    #[arg(long = "role")]
    roles: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Starting regtrack-import");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = RegtrackConfig::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.db_path = db;
    }
    info!("Database: {}", config.db_path.display());

    let store = Arc::new(SqliteRecordStore::open(&config.db_path).await?);
    let audit = Arc::new(SqliteAuditSink::from_pool(store.pool().clone()).await?);

    let rows = read_rows(&args.csv)?;
    info!("Read {} rows from {}", rows.len(), args.csv.display());

    let task_id = Uuid::new_v4();
    info!("Import task: {}", task_id);

    let status = DataSource::new(
        store,
        audit,
        task_id,
        &args.user,
        args.roles,
        args.datasource,
        args.kind,
        rows,
    )
    .with_batch_size(config.csv_import_batch_size)
    .run()
    .await;

    info!(
        "Processed {}/{} rows ({} failed)",
        status.items_processed,
        status.item_total,
        status.individual_record_status.len()
    );
    for failure in &status.individual_record_status {
        warn!(
            "Row {} ({}): {}",
            failure.row_index,
            failure.source_ref_id.as_deref().unwrap_or("no key"),
            failure.message
        );
    }

    if let Some(error) = &status.error {
        anyhow::bail!("Import stopped early: {}", error);
    }
    if !status.is_clean() {
        anyhow::bail!(
            "{} of {} rows failed",
            status.individual_record_status.len(),
            status.item_total
        );
    }

    Ok(())
}

/// Read every CSV record into a header-keyed row map
fn read_rows(path: &std::path::Path) -> Result<Vec<CsvRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: CsvRow = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}
