//! Error types for series-dl
//!
//! This module provides the error handling used across the pipeline:
//! - Domain-specific error types (Feed, Transfer, Handoff, Database)
//! - A [`FailureKind`] taxonomy that tells the coordinator at which boundary a failure is isolated
//! - Context information (feed URL, descriptor URL, episode name, source/destination paths)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for series-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for series-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "series.0.episode_regex")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// RSS feed could not be fetched or parsed
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Transfer job failed (descriptor or client side)
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Relocating a finished payload failed
    #[error("handoff error: {0}")]
    Handoff(#[from] HandoffError),

    /// Transfer client API call failed (login, transport, unexpected response)
    #[error("transfer client error: {0}")]
    Client(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error pointing at a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Classify this error into the failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Config { .. } => FailureKind::Configuration,
            Error::Feed(_) => FailureKind::Feed,
            Error::Transfer(e) => e.kind(),
            Error::Client(_) => FailureKind::TransferClient,
            Error::Handoff(_) => FailureKind::Handoff,
            Error::Database(_)
            | Error::Sqlx(_)
            | Error::Network(_)
            | Error::Other(_) => FailureKind::Unclassified,
        }
    }
}

/// Where a failure belongs, which decides how far it is allowed to propagate
///
/// Only [`FailureKind::Configuration`] aborts a whole run. Feed failures isolate to one series;
/// everything else isolates to one episode's transfer job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Invalid rule or client settings, caught before the pipeline runs
    Configuration,
    /// Feed unreachable or unparseable
    Feed,
    /// Descriptor fetch/parse failure or a multi-file descriptor
    TransferDescriptor,
    /// Client refused the job, reported it errored, or lost track of it
    TransferClient,
    /// Directory creation or move failed after a completed download
    Handoff,
    /// Anything else caught at a job boundary
    Unclassified,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Feed => "feed",
            FailureKind::TransferDescriptor => "transfer-descriptor",
            FailureKind::TransferClient => "transfer-client",
            FailureKind::Handoff => "handoff",
            FailureKind::Unclassified => "unclassified",
        };
        f.write_str(s)
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Feed-related errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// Feed returned a non-success status or the request itself failed
    #[error("feed unreachable: {url} ({status})")]
    Unreachable {
        /// Feed URL
        url: String,
        /// HTTP status code, or transport error description
        status: String,
    },

    /// Body could not be parsed as RSS or Atom
    #[error("feed unparseable: {url} ({reason})")]
    Unparseable {
        /// Feed URL
        url: String,
        /// Parser error messages
        reason: String,
    },
}

/// Transfer job errors, one per terminal failure state of the orchestrator
#[derive(Debug, Error)]
pub enum TransferError {
    /// Descriptor download returned a non-success status
    #[error("invalid torrent url: {url} ({status})")]
    DescriptorFetch {
        /// Descriptor URL
        url: String,
        /// HTTP status code, or transport error description
        status: String,
    },

    /// Descriptor bytes are not a valid torrent
    #[error("failed to read torrent: {url} ({reason})")]
    InvalidDescriptor {
        /// Descriptor URL
        url: String,
        /// What was wrong with it
        reason: String,
    },

    /// Descriptor references more than one payload file
    #[error("too many files in torrent {url} ({count}), only single-file torrents are supported")]
    TooManyFiles {
        /// Descriptor URL
        url: String,
        /// Number of files in the descriptor
        count: usize,
    },

    /// Client signalled it cannot add this descriptor
    #[error("failed to add torrent: {name}")]
    AddRejected {
        /// Episode display name
        name: String,
    },

    /// Client API call failed while adding or tracking the job
    #[error("transfer client failed for {name}: {message}")]
    Client {
        /// Episode display name
        name: String,
        /// Underlying client error
        message: String,
    },

    /// Client reports the job in an error state
    #[error("torrent errored: {name}")]
    Errored {
        /// Episode display name
        name: String,
    },

    /// Client stopped listing the job for longer than the missing-poll budget
    #[error("torrent disappeared: {name} (missing for {missed_polls} consecutive polls)")]
    Disappeared {
        /// Episode display name
        name: String,
        /// Consecutive polls without the job being listed
        missed_polls: u32,
    },

    /// Client reports completion but lists no payload file
    #[error("torrent completed without a payload file: {name}")]
    NoPayload {
        /// Episode display name
        name: String,
    },

    /// Run was cancelled while the job was in flight
    #[error("transfer cancelled: {name}")]
    Cancelled {
        /// Episode display name
        name: String,
    },
}

impl TransferError {
    /// Classify this error into the failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            TransferError::DescriptorFetch { .. }
            | TransferError::InvalidDescriptor { .. }
            | TransferError::TooManyFiles { .. } => FailureKind::TransferDescriptor,
            TransferError::AddRejected { .. }
            | TransferError::Client { .. }
            | TransferError::Errored { .. }
            | TransferError::Disappeared { .. }
            | TransferError::NoPayload { .. } => FailureKind::TransferClient,
            TransferError::Cancelled { .. } => FailureKind::Unclassified,
        }
    }
}

/// Errors while moving a completed payload into the series library
#[derive(Debug, Error)]
pub enum HandoffError {
    /// Destination directory could not be created
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Payload could not be moved
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        /// Client-side payload path
        from: PathBuf,
        /// Library destination path
        to: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
