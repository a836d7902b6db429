//! Run coordinator: one bounded pass over every configured series
//!
//! Series that pass the airtime gate are processed in fixed-size batches. Batches run one after
//! another; the series inside a batch run concurrently, and every eligible episode of a series is
//! downloaded concurrently. A series' successes are committed to the ledger only after all of its
//! jobs have resolved.
//!
//! A panic inside one job or one series is caught where that unit is awaited and reported as an
//! unclassified failure, so siblings and later batches still run.

use crate::airtime;
use crate::error::FailureKind;
use crate::feed::FeedSource;
use crate::handoff;
use crate::ledger::{self, AcquiredEpisode, LedgerStore};
use crate::matcher;
use crate::rule::SeriesRule;
use crate::transfer::TransferOrchestrator;
use crate::types::{CandidateEpisode, JobOutcome, RunSummary, SeriesStatus, SeriesSummary};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Per-invocation overrides
#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
    /// Check every series regardless of its airtime
    pub skip_time_check: bool,
    /// Ignore each series' minimum episode number
    pub skip_start_check: bool,
    /// Instant the airtime gate is evaluated at
    pub now: DateTime<Utc>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_time_check: false,
            skip_start_check: false,
            now: Utc::now(),
        }
    }
}

/// Drives the whole feed → download → library pipeline for a rule set
pub struct RunCoordinator {
    rules: Vec<SeriesRule>,
    feeds: Arc<dyn FeedSource>,
    ledger: Arc<dyn LedgerStore>,
    orchestrator: Arc<TransferOrchestrator>,
    reference: Tz,
    batch_size: usize,
}

impl RunCoordinator {
    /// Create a coordinator
    ///
    /// `reference` is the timezone for airtimes without an offset. A `batch_size` of zero is
    /// treated as one.
    pub fn new(
        rules: Vec<SeriesRule>,
        feeds: Arc<dyn FeedSource>,
        ledger: Arc<dyn LedgerStore>,
        orchestrator: Arc<TransferOrchestrator>,
        reference: Tz,
        batch_size: usize,
    ) -> Self {
        Self {
            rules,
            feeds,
            ledger,
            orchestrator,
            reference,
            batch_size: batch_size.max(1),
        }
    }

    /// Run every due series once
    ///
    /// Never fails: feed, ledger and job failures are recorded in the returned summary. Once
    /// `cancel` fires no further batch is started and in-flight jobs stop at their next poll.
    pub async fn run_once(&self, options: RunOptions, cancel: &CancellationToken) -> RunSummary {
        info!(
            series = self.rules.len(),
            skip_time_check = options.skip_time_check,
            skip_start_check = options.skip_start_check,
            "Starting run"
        );

        let mut slots: Vec<Option<SeriesSummary>> = vec![None; self.rules.len()];
        let mut due = Vec::new();
        for (idx, rule) in self.rules.iter().enumerate() {
            if options.skip_time_check || airtime::should_check(rule, options.now, self.reference)
            {
                due.push(idx);
            } else {
                slots[idx] = Some(SeriesSummary::skipped(&rule.id));
            }
        }

        let mut cancelled = false;
        for (batch_no, batch) in due.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                warn!(batch = batch_no, "Run cancelled, not starting remaining batches");
                cancelled = true;
                break;
            }

            info!(batch = batch_no, series = batch.len(), "Processing batch");
            let results = join_all(
                batch
                    .iter()
                    .map(|&idx| self.guarded_series(&self.rules[idx], options, cancel)),
            )
            .await;

            for (&idx, summary) in batch.iter().zip(results) {
                slots[idx] = Some(summary);
            }
        }

        let series: Vec<SeriesSummary> = slots
            .into_iter()
            .zip(&self.rules)
            .map(|(slot, rule)| slot.unwrap_or_else(|| SeriesSummary::skipped(&rule.id)))
            .collect();

        let summary = RunSummary {
            series,
            cancelled: cancelled || cancel.is_cancelled(),
        };
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            cancelled = summary.cancelled,
            "Run finished"
        );
        summary
    }

    async fn guarded_series(
        &self,
        rule: &SeriesRule,
        options: RunOptions,
        cancel: &CancellationToken,
    ) -> SeriesSummary {
        match AssertUnwindSafe(self.process_series(rule, options, cancel))
            .catch_unwind()
            .await
        {
            Ok(summary) => summary,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(series = %rule.id, error = %message, "Series processing panicked");
                SeriesSummary::failed(&rule.id, FailureKind::Unclassified, message)
            }
        }
    }

    async fn process_series(
        &self,
        rule: &SeriesRule,
        options: RunOptions,
        cancel: &CancellationToken,
    ) -> SeriesSummary {
        let entries = match self.feeds.fetch(&rule.feed_url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(series = %rule.id, error = %e, "Skipping series, feed failed");
                return SeriesSummary::failed(&rule.id, FailureKind::Feed, e.to_string());
            }
        };

        let record = match self.ledger.load(&rule.id).await {
            Ok(record) => record,
            Err(e) => {
                error!(series = %rule.id, error = %e, "Skipping series, ledger failed to load");
                return SeriesSummary::failed(&rule.id, e.kind(), e.to_string());
            }
        };

        let candidates = matcher::match_feed(&entries, rule, options.now);
        let floor = (!options.skip_start_check).then_some(rule.start_from);
        let eligible = ledger::filter_eligible(candidates, &record, floor);

        let attempted = eligible.len();
        if attempted == 0 {
            info!(series = %rule.id, "No new episodes");
        }

        let outcomes = join_all(
            eligible
                .into_iter()
                .map(|candidate| self.run_job(rule, candidate, cancel)),
        )
        .await;

        let acquired_at = Utc::now();
        let acquired: Vec<AcquiredEpisode> = outcomes
            .iter()
            .filter_map(|outcome| {
                let path = outcome.result.as_ref().ok()?;
                Some(AcquiredEpisode {
                    season: outcome.season,
                    episode: outcome.episode,
                    title: outcome.name.clone(),
                    path: path.clone(),
                    acquired_at,
                })
            })
            .collect();
        let mut succeeded = acquired.len();

        let mut status = SeriesStatus::Processed;
        if !acquired.is_empty()
            && let Err(e) = self.ledger.commit(&rule.id, &acquired).await
        {
            // Relocated but unrecorded episodes count as failures
            error!(series = %rule.id, error = %e, episodes = succeeded, "Failed to record acquired episodes");
            succeeded = 0;
            status = SeriesStatus::Failed {
                kind: e.kind(),
                message: e.to_string(),
            };
        }

        let summary = SeriesSummary {
            series_id: rule.id.clone(),
            status,
            attempted,
            succeeded,
            failed: attempted - succeeded,
        };
        info!(
            series = %rule.id,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Series finished"
        );
        summary
    }

    /// Download one episode and move it into the library
    async fn run_job(
        &self,
        rule: &SeriesRule,
        candidate: CandidateEpisode,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let season = ledger::ledger_season(&candidate);
        let episode = candidate.episode;
        let name = candidate.name.clone();

        let result = match AssertUnwindSafe(self.transfer_and_place(rule, candidate, cancel))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(series = %rule.id, torrent = %name, error = %message, "Transfer job panicked");
                Err((FailureKind::Unclassified, message))
            }
        };

        JobOutcome {
            season,
            episode,
            name,
            result,
        }
    }

    async fn transfer_and_place(
        &self,
        rule: &SeriesRule,
        candidate: CandidateEpisode,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, (FailureKind, String)> {
        let done = self
            .orchestrator
            .run(candidate, cancel)
            .await
            .map_err(|e| (e.kind(), e.to_string()))?;

        let destination =
            handoff::destination_path(rule, &done.candidate, done.payload_path.extension());
        handoff::relocate(&done.payload_path, &destination)
            .await
            .map_err(|e| {
                error!(series = %rule.id, torrent = %done.candidate.name, error = %e, "Failed to move payload");
                (FailureKind::Handoff, e.to_string())
            })?;
        Ok(destination)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("panicked: {detail}")
}
