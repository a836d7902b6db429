//! Moves a finished payload from the client's save directory into the series library

use crate::error::HandoffError;
use crate::rule::SeriesRule;
use crate::types::CandidateEpisode;
use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Library path for an episode: `target_dir / rendered template [. extension]`
///
/// The template may contain `/` to file episodes into subdirectories.
pub fn destination_path(
    rule: &SeriesRule,
    candidate: &CandidateEpisode,
    extension: Option<&OsStr>,
) -> PathBuf {
    let mut file_name = OsString::from(rule.target_name.render(
        &rule.id,
        candidate.season,
        candidate.episode,
    ));
    if let Some(ext) = extension.filter(|ext| !ext.is_empty()) {
        file_name.push(".");
        file_name.push(ext);
    }
    rule.target_dir.join(file_name)
}

/// Move `from` to `to`, creating parent directories
///
/// Falls back to copy and remove when the two paths are on different filesystems.
pub async fn relocate(from: &Path, to: &Path) -> Result<(), HandoffError> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| HandoffError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    if tokio::fs::try_exists(to).await.unwrap_or(false) {
        warn!(destination = %to.display(), "Destination exists, replacing");
    }

    info!(from = %from.display(), to = %to.display(), "Moving payload");
    let move_err = |source| HandoffError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            tokio::fs::copy(from, to).await.map_err(move_err)?;
            tokio::fs::remove_file(from).await.map_err(move_err)?;
            Ok(())
        }
        Err(e) => Err(move_err(e)),
    }
}
