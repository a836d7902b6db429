//! Transfer orchestration: drives one episode through the transfer client to completion
//!
//! Each job moves through `Fetching → Added → Polling` and stops in `Complete`, `Errored` or
//! `Missing`. There is no retry inside a run; a failed job is rediscovered from the feed on the next
//! invocation unless it was recorded in the ledger.

use crate::client::{JobInfo, JobState, TransferClient};
use crate::config::Config;
use crate::error::TransferError;
use crate::torrent::TorrentDescriptor;
use crate::types::{CandidateEpisode, TransferJob, TransferPhase};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Polling behaviour and client options for transfer jobs
#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    /// Delay before each status poll
    pub poll_interval: Duration,
    /// Consecutive polls a job may be unlisted before it is declared gone
    pub missing_poll_budget: u32,
    /// Category label passed to the client on add
    pub category: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            missing_poll_budget: 5,
            category: None,
        }
    }
}

impl OrchestratorSettings {
    /// Settings taken from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.schedule.poll_interval,
            missing_poll_budget: config.schedule.missing_poll_budget,
            category: config.client.category.clone(),
        }
    }
}

/// A finished download, ready for handoff
#[derive(Clone, Debug)]
pub struct CompletedTransfer {
    /// Episode that was downloaded, with its info-hash filled in
    pub candidate: CandidateEpisode,
    /// Absolute location of the payload in the client's save directory
    pub payload_path: PathBuf,
}

/// Runs transfer jobs against a shared client
pub struct TransferOrchestrator {
    client: Arc<dyn TransferClient>,
    http_client: reqwest::Client,
    settings: OrchestratorSettings,
}

impl TransferOrchestrator {
    /// Create an orchestrator
    ///
    /// `http_client` is used to download descriptors; `client` is shared by every job.
    pub fn new(
        client: Arc<dyn TransferClient>,
        http_client: reqwest::Client,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            client,
            http_client,
            settings,
        }
    }

    /// Drive one candidate to completion
    ///
    /// Cancellation is only observed between steps; an in-flight client call always finishes.
    pub async fn run(
        &self,
        candidate: CandidateEpisode,
        cancel: &CancellationToken,
    ) -> Result<CompletedTransfer, TransferError> {
        let mut job = TransferJob::new(candidate);
        let result = self.drive(&mut job, cancel).await;
        match &result {
            Ok(done) => info!(
                series = %job.candidate.series_id,
                episode = %job.candidate,
                payload = %done.payload_path.display(),
                "Torrent downloaded"
            ),
            Err(e) => warn!(
                series = %job.candidate.series_id,
                episode = %job.candidate,
                phase = %job.phase,
                error = %e,
                "Transfer job failed"
            ),
        }
        result
    }

    async fn drive(
        &self,
        job: &mut TransferJob,
        cancel: &CancellationToken,
    ) -> Result<CompletedTransfer, TransferError> {
        let name = job.candidate.name.clone();
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled { name });
        }

        info!(series = %job.candidate.series_id, torrent = %name, "Adding torrent to client");
        let (bytes, descriptor) = self.fetch_descriptor(&job.candidate.link).await?;

        if let Some(advertised) = &job.candidate.info_hash
            && !advertised.eq_ignore_ascii_case(&descriptor.info_hash)
        {
            debug!(
                torrent = %name,
                feed_hash = %advertised,
                info_hash = %descriptor.info_hash,
                "Feed info-hash differs from descriptor"
            );
        }
        job.candidate.info_hash = Some(descriptor.info_hash.clone());

        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled { name });
        }

        let added = self
            .client
            .add(&bytes, self.settings.category.as_deref())
            .await
            .map_err(|e| TransferError::Client {
                name: name.clone(),
                message: e.to_string(),
            })?;
        if !added {
            return Err(TransferError::AddRejected { name });
        }
        job.job_id = Some(descriptor.info_hash.clone());
        job.phase = TransferPhase::Added;

        info!(torrent = %name, info_hash = %descriptor.info_hash, "Waiting for client to finish downloading");
        job.phase = TransferPhase::Polling;
        let info = self.poll(job, &descriptor.info_hash, cancel).await?;
        self.complete(job, info).await
    }

    async fn fetch_descriptor(
        &self,
        url: &str,
    ) -> Result<(Vec<u8>, TorrentDescriptor), TransferError> {
        let fetch_err = |status: String| TransferError::DescriptorFetch {
            url: url.to_string(),
            status,
        };

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(status.as_u16().to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(format!("failed to read body: {}", e)))?
            .to_vec();

        let descriptor =
            TorrentDescriptor::parse(&bytes).map_err(|reason| TransferError::InvalidDescriptor {
                url: url.to_string(),
                reason,
            })?;

        if descriptor.files.is_empty() {
            return Err(TransferError::InvalidDescriptor {
                url: url.to_string(),
                reason: "descriptor lists no files".to_string(),
            });
        }
        if !descriptor.is_single_file() {
            return Err(TransferError::TooManyFiles {
                url: url.to_string(),
                count: descriptor.files.len(),
            });
        }
        Ok((bytes, descriptor))
    }

    /// Poll until the client reports the job complete or errored, or stops listing it
    async fn poll(
        &self,
        job: &mut TransferJob,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<JobInfo, TransferError> {
        let name = job.candidate.name.clone();
        let budget = self.settings.missing_poll_budget;
        let mut missed = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransferError::Cancelled { name }),
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }

            let info = match self.client.job(id).await {
                Ok(Some(info)) => info,
                Ok(None) => {
                    missed += 1;
                    if missed > budget {
                        job.phase = TransferPhase::Missing;
                        return Err(TransferError::Disappeared {
                            name,
                            missed_polls: missed,
                        });
                    }
                    debug!(torrent = %name, missed, budget, "Torrent not listed by client");
                    continue;
                }
                Err(e) => {
                    // Unreachable client counts against the same budget as an unlisted job
                    missed += 1;
                    if missed > budget {
                        job.phase = TransferPhase::Missing;
                        return Err(TransferError::Client {
                            name,
                            message: e.to_string(),
                        });
                    }
                    warn!(torrent = %name, missed, budget, error = %e, "Failed to poll client");
                    continue;
                }
            };
            missed = 0;

            match info.state {
                JobState::Errored => {
                    job.phase = TransferPhase::Errored;
                    return Err(TransferError::Errored { name });
                }
                JobState::Complete => return Ok(info),
                JobState::Active => {
                    debug!(torrent = %name, progress = info.progress, "Torrent downloading");
                }
            }
        }
    }

    async fn complete(
        &self,
        job: &mut TransferJob,
        info: JobInfo,
    ) -> Result<CompletedTransfer, TransferError> {
        let name = job.candidate.name.clone();
        let files = self
            .client
            .files(&info.id)
            .await
            .map_err(|e| TransferError::Client {
                name: name.clone(),
                message: e.to_string(),
            })?;
        let Some(file) = files.into_iter().next() else {
            return Err(TransferError::NoPayload { name });
        };
        let payload_path = info.save_path.join(file);

        // The payload stays on disk; only the queue entry is removed
        if let Err(e) = self.client.delete(&info.id).await {
            warn!(torrent = %name, error = %e, "Failed to remove finished torrent from client");
        }

        job.phase = TransferPhase::Complete;
        job.payload_path = Some(payload_path.clone());

        Ok(CompletedTransfer {
            candidate: job.candidate.clone(),
            payload_path,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
