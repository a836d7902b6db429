//! Traits and types for transfer clients

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Coarse job state as seen by the orchestrator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Downloading, queued, checking, or paused before completion
    Active,
    /// Payload fully downloaded
    Complete,
    /// Client gave up on the job
    Errored,
}

/// Snapshot of one job as reported by the client
#[derive(Clone, Debug, PartialEq)]
pub struct JobInfo {
    /// Client-side identifier (info-hash)
    pub id: String,
    /// Current state
    pub state: JobState,
    /// Directory the client saves the payload into
    pub save_path: PathBuf,
    /// Completion fraction in `[0, 1]`
    pub progress: f64,
}

/// Capability set the orchestrator needs from an external transfer client
///
/// Implementations are shared across every concurrent job of a run, so every method takes
/// `&self` and must be safe to interleave. None of the calls can be cancelled on the client side;
/// callers only stop issuing new ones.
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Human-readable client name for logs
    fn name(&self) -> &str;

    /// Authenticate, if the client needs it
    async fn login(&self) -> Result<()>;

    /// Hand a descriptor to the client
    ///
    /// Returns `Ok(false)` when the client reports it cannot add this descriptor (for example an
    /// unsupported format). Transport and protocol failures are errors.
    async fn add(&self, descriptor: &[u8], category: Option<&str>) -> Result<bool>;

    /// Look up one job; `None` when the client does not list it
    async fn job(&self, id: &str) -> Result<Option<JobInfo>>;

    /// Payload file names of a job, relative to its save directory
    async fn files(&self, id: &str) -> Result<Vec<String>>;

    /// Remove a job from the client's queue, keeping the payload on disk
    async fn delete(&self, id: &str) -> Result<()>;
}
