//! Core types flowing through the pipeline

use crate::error::FailureKind;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// One item from a series feed, in feed order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedEntry {
    /// Item title
    pub title: String,

    /// Link to the `.torrent` descriptor
    pub link: String,

    /// Info-hash advertised by the feed (`nyaa:infoHash`), if any
    pub info_hash: Option<String>,
}

impl FeedEntry {
    /// Create an entry without an advertised info-hash
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            info_hash: None,
        }
    }
}

/// A feed entry identified as a wanted episode of one series
///
/// Created fresh per run by the matcher. Only `info_hash` changes afterwards, once the
/// descriptor has been fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateEpisode {
    /// ID of the series rule that matched
    pub series_id: String,

    /// Feed entry title
    pub name: String,

    /// Descriptor URL
    pub link: String,

    /// Content hash; from the feed initially, replaced by the descriptor's info-hash
    pub info_hash: Option<String>,

    /// Resolved season (title capture, else the rule's default)
    pub season: u32,

    /// Resolved episode number
    pub episode: u32,

    /// When the matcher produced this candidate
    pub discovered_at: DateTime<Utc>,
}

impl fmt::Display for CandidateEpisode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Orchestrator state for one transfer job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferPhase {
    /// Downloading and parsing the descriptor
    Fetching,
    /// Descriptor accepted by the client
    Added,
    /// Waiting for the client to finish
    Polling,
    /// Client finished; payload located and job cleared from the client
    Complete,
    /// Client reported an error state
    Errored,
    /// Client stopped listing the job
    Missing,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferPhase::Fetching => "fetching",
            TransferPhase::Added => "added",
            TransferPhase::Polling => "polling",
            TransferPhase::Complete => "complete",
            TransferPhase::Errored => "errored",
            TransferPhase::Missing => "missing",
        };
        f.write_str(s)
    }
}

/// One in-flight download; never persisted
#[derive(Clone, Debug)]
pub struct TransferJob {
    /// Episode being downloaded
    pub candidate: CandidateEpisode,

    /// Client-side identifier (the info-hash), known once added
    pub job_id: Option<String>,

    /// Current state
    pub phase: TransferPhase,

    /// Payload location reported by the client once complete
    pub payload_path: Option<PathBuf>,
}

impl TransferJob {
    /// Start a job for a candidate
    pub fn new(candidate: CandidateEpisode) -> Self {
        Self {
            candidate,
            job_id: None,
            phase: TransferPhase::Fetching,
            payload_path: None,
        }
    }
}

/// Result of one episode's job after handoff
#[derive(Clone, Debug)]
pub struct JobOutcome {
    /// Season the episode is recorded under
    pub season: u32,

    /// Episode number
    pub episode: u32,

    /// Feed entry title
    pub name: String,

    /// Library path on success, failure class and message otherwise
    pub result: std::result::Result<PathBuf, (FailureKind, String)>,
}

/// How a series fared in one run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeriesStatus {
    /// Airtime gate decided the series is not due
    Skipped,
    /// Feed or ledger load failed; nothing was attempted
    Failed {
        /// Failure class
        kind: FailureKind,
        /// Error message
        message: String,
    },
    /// Series was processed (individual jobs may still have failed)
    Processed,
}

/// Per-series counts for one run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesSummary {
    /// Series ID
    pub series_id: String,

    /// Overall status
    pub status: SeriesStatus,

    /// Jobs launched
    pub attempted: usize,

    /// Jobs downloaded, relocated and recorded
    pub succeeded: usize,

    /// Jobs that failed at any stage
    pub failed: usize,
}

impl SeriesSummary {
    /// Summary for a series the gate skipped
    pub fn skipped(series_id: impl Into<String>) -> Self {
        Self {
            series_id: series_id.into(),
            status: SeriesStatus::Skipped,
            attempted: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Summary for a series that failed before any job ran
    pub fn failed(series_id: impl Into<String>, kind: FailureKind, message: String) -> Self {
        Self {
            series_id: series_id.into(),
            status: SeriesStatus::Failed { kind, message },
            attempted: 0,
            succeeded: 0,
            failed: 0,
        }
    }
}

/// Outcome of one invocation
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    /// One entry per configured series, in configuration order
    pub series: Vec<SeriesSummary>,

    /// Whether the run stopped early because it was cancelled
    pub cancelled: bool,
}

impl RunSummary {
    /// Summary for a given series
    pub fn get(&self, series_id: &str) -> Option<&SeriesSummary> {
        self.series.iter().find(|s| s.series_id == series_id)
    }

    /// Total successful jobs
    pub fn succeeded(&self) -> usize {
        self.series.iter().map(|s| s.succeeded).sum()
    }

    /// Total failed jobs
    pub fn failed(&self) -> usize {
        self.series.iter().map(|s| s.failed).sum()
    }
}
