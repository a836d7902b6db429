//! # series-dl
//!
//! Follows episodic torrent feeds, downloads new episodes through a torrent client and files
//! them into a per-series library.
//!
//! One invocation is a bounded batch job:
//!
//! 1. The airtime gate decides which series are due.
//! 2. Each due series' RSS feed is fetched and matched against its episode pattern.
//! 3. Episodes already in the dedup ledger (or below the series' starting episode) are dropped.
//! 4. Every remaining episode is handed to the transfer client and polled until it finishes.
//! 5. Finished payloads are moved into the library and recorded in the ledger.
//!
//! ## Quick Start
//!
//! ```no_run
//! use series_dl::{
//!     Config, Database, HttpFeedSource, OrchestratorSettings, RunCoordinator, RunOptions,
//!     TransferOrchestrator, create_client, run_with_shutdown,
//! };
//! use series_dl::feed::build_http_client;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file(Path::new("config.toml"))?;
//!     let rules = config.validate()?;
//!     let db = Database::new(&config.persistence.database_path).await?;
//!
//!     let client = create_client(&config.client, config.schedule.request_timeout)?;
//!     client.login().await?;
//!
//!     let http = build_http_client(config.schedule.request_timeout)?;
//!     let orchestrator = TransferOrchestrator::new(
//!         client,
//!         http.clone(),
//!         OrchestratorSettings::from_config(&config),
//!     );
//!     let coordinator = RunCoordinator::new(
//!         rules,
//!         Arc::new(HttpFeedSource::with_client(http)),
//!         Arc::new(db),
//!         Arc::new(orchestrator),
//!         config.schedule.timezone()?,
//!         config.schedule.batch_size,
//!     );
//!
//!     let summary = run_with_shutdown(&coordinator, RunOptions::default()).await;
//!     println!("{} downloaded, {} failed", summary.succeeded(), summary.failed());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Airtime gate
pub mod airtime;
/// Transfer client abstraction and qBittorrent implementation
pub mod client;
/// Configuration types
pub mod config;
/// Run coordinator
pub mod coordinator;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// RSS/Atom feed source
pub mod feed;
/// Moving finished payloads into the library
pub mod handoff;
/// Dedup ledger
pub mod ledger;
/// Feed entry matching
pub mod matcher;
/// Validated series rules
pub mod rule;
/// Torrent descriptor parsing
pub mod torrent;
/// Transfer orchestration
pub mod transfer;
/// Core types
pub mod types;

// Re-export commonly used types
pub use client::{JobInfo, JobState, QBittorrentClient, TransferClient, create_client};
pub use config::{ClientConfig, Config, PersistenceConfig, ScheduleConfig, SeriesConfig};
pub use coordinator::{RunCoordinator, RunOptions};
pub use db::Database;
pub use error::{
    DatabaseError, Error, FailureKind, FeedError, HandoffError, Result, TransferError,
};
pub use feed::{FeedSource, HttpFeedSource};
pub use ledger::{AcquiredEpisode, DedupRecord, LedgerStore};
pub use rule::{Airtime, NameTemplate, SeriesRule};
pub use transfer::{CompletedTransfer, OrchestratorSettings, TransferOrchestrator};
pub use types::{
    CandidateEpisode, FeedEntry, JobOutcome, RunSummary, SeriesStatus, SeriesSummary,
    TransferJob, TransferPhase,
};

use tokio_util::sync::CancellationToken;

/// Run the coordinator once with graceful signal handling.
///
/// A termination signal cancels the run: no further batch is started and in-flight jobs stop at
/// their next poll. Jobs that already finished are still moved and recorded before this returns.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(coordinator: &RunCoordinator, options: RunOptions) -> RunSummary {
    let cancel = CancellationToken::new();
    let run = coordinator.run_once(options, &cancel);
    tokio::pin!(run);

    tokio::select! {
        summary = &mut run => summary,
        _ = wait_for_signal() => {
            tracing::warn!("Shutdown requested, cancelling run");
            cancel.cancel();
            run.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
