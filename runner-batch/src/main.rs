use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ingest_core::config::{IngestConfig, load_config};
use ingest_core::{CancelHandle, Clock, RunReport, SystemClock, db, run_dataset, telemetry};
use tracing::{error, info, warn};

/// Loads MovieLens CSV exports into the configured database.
///
/// What it does at a high-level:
///     Load config.
///     Open the database and make sure the tables exist.
///     Run every enabled dataset pipeline on its own task:
///         - read the CSV in chunks
///         - write each chunk in one transaction
///     Exit non-zero if any pipeline failed.
#[derive(Debug, Parser)]
#[command(name = "movielens-loader", version)]
struct Args {
    /// YAML config file. When omitted the document is read from INGEST_CONFIG.
    #[arg(long, env = "INGEST_CONFIG_PATH")]
    config: Option<String>,

    /// Only run these datasets (by name). Repeatable.
    #[arg(long = "dataset")]
    datasets: Vec<String>,

    /// Print run summaries as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let pool = db::connect(&config.database)
        .await
        .context("Failed to open database")?;
    if config.database.create_schema {
        db::ensure_schema(&pool)
            .await
            .context("Failed to create destination tables")?;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current chunks");
                cancel.cancel();
            }
        });
    }

    let reports = run_selected(&config, &args.datasets, pool, clock, cancel).await?;

    if args.json {
        let summaries: Vec<_> = reports.iter().map(|r| &r.summary).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }

    let failed: Vec<&RunReport> = reports.iter().filter(|r| !r.is_success()).collect();
    for report in &failed {
        if let Some(e) = &report.failure {
            error!(
                "{} failed ({:?}) after {} records: {}",
                report.summary.dataset,
                e.kind(),
                report.summary.records_written,
                e
            );
            if e.is_rerunnable() {
                warn!("{} may succeed if re-run", report.summary.dataset);
            }
        }
    }
    if !failed.is_empty() {
        anyhow::bail!("{} of {} dataset runs failed", failed.len(), reports.len());
    }

    info!("All {} dataset runs completed", reports.len());
    Ok(())
}

async fn run_selected(
    config: &IngestConfig,
    only: &[String],
    pool: ingest_core::db::Pool,
    clock: Arc<dyn Clock>,
    cancel: CancelHandle,
) -> Result<Vec<RunReport>> {
    let selected: Vec<_> = config
        .enabled_datasets()
        .filter(|d| only.is_empty() || only.contains(&d.name))
        .cloned()
        .collect();
    if selected.is_empty() {
        anyhow::bail!("No enabled dataset matches {:?}", only);
    }

    // datasets share nothing but the pool, so each gets its own task
    let tasks = selected.into_iter().map(|dataset| {
        let processing = config.processing.clone();
        let pool = pool.clone();
        let clock = clock.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { run_dataset(&dataset, &processing, pool, clock, cancel).await })
    });

    let mut reports = Vec::new();
    for joined in futures::future::join_all(tasks).await {
        reports.push(joined.context("Dataset task panicked")?);
    }
    Ok(reports)
}
