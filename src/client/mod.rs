//! Transfer client abstraction
//!
//! The orchestrator only depends on [`TransferClient`]. The concrete implementation is picked
//! once at startup from [`ClientConfig::kind`] by [`create_client`].

use crate::config::{ClientConfig, ClientKind};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod qbittorrent;
mod traits;

pub use qbittorrent::{QBittorrentClient, job_state};
pub use traits::{JobInfo, JobState, TransferClient};

/// Build the configured transfer client
///
/// The returned handle is shared by every job of a run.
pub fn create_client(
    config: &ClientConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn TransferClient>> {
    let client: Arc<dyn TransferClient> = match config.kind {
        ClientKind::QBittorrent => Arc::new(QBittorrentClient::new(
            &config.url,
            config.username.clone(),
            config.password.clone(),
            request_timeout,
        )?),
    };
    info!(client = client.name(), url = %config.url, "Transfer client configured");
    Ok(client)
}
