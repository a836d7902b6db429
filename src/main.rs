//! CLI entry point for series-dl.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use series_dl::feed::build_http_client;
use series_dl::{
    Config, Database, HttpFeedSource, OrchestratorSettings, RunCoordinator, RunOptions,
    TransferOrchestrator, create_client, run_with_shutdown,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

const LOCK_FILE_NAME: &str = "series-dl.lock";

/// Lock file held for the lifetime of a run; removed on drop
struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Create the lock file, or return `None` if another run holds it
    fn acquire(path: PathBuf) -> Result<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Some(Self { path })),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to create lock file {}", path.display()))
            }
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

fn lock_path(database_path: &Path) -> PathBuf {
    database_path
        .parent()
        .map(|dir| dir.join(LOCK_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(LOCK_FILE_NAME))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let rules = config.validate()?;
    let reference = config.schedule.timezone()?;

    if let Some(dir) = config
        .persistence
        .database_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let Some(_lock) = RunLock::acquire(lock_path(&config.persistence.database_path))? else {
        warn!(
            lock = %lock_path(&config.persistence.database_path).display(),
            "Another run is in progress, exiting"
        );
        return Ok(());
    };

    info!(series = rules.len(), "series-dl starting");

    let db = Arc::new(
        Database::new(&config.persistence.database_path)
            .await
            .context("failed to open ledger database")?,
    );

    let client = create_client(&config.client, config.schedule.request_timeout)?;
    client
        .login()
        .await
        .with_context(|| format!("failed to log in to {}", client.name()))?;

    let http = build_http_client(config.schedule.request_timeout)?;
    let orchestrator = TransferOrchestrator::new(
        client,
        http.clone(),
        OrchestratorSettings::from_config(&config),
    );
    let coordinator = RunCoordinator::new(
        rules,
        Arc::new(HttpFeedSource::with_client(http)),
        db.clone(),
        Arc::new(orchestrator),
        reference,
        config.schedule.batch_size,
    );

    let options = RunOptions {
        skip_time_check: args.skip_time_check,
        skip_start_check: args.skip_start_check,
        ..RunOptions::default()
    };
    let summary = run_with_shutdown(&coordinator, options).await;

    db.pool().close().await;

    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        cancelled = summary.cancelled,
        "Run complete"
    );

    Ok(())
}
