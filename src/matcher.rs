//! Rule-based matching of feed entries to episodes
//!
//! An entry becomes a [`CandidateEpisode`] only when its title satisfies the rule's episode
//! pattern, contains none of the ignore substrings, and contains every required substring.
//! Substring checks are case-insensitive. Output keeps the feed's entry order.

use crate::rule::SeriesRule;
use crate::types::{CandidateEpisode, FeedEntry};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Why an entry was not turned into a candidate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Title does not satisfy the episode pattern
    PatternMismatch,
    /// Title contains an ignore substring
    Ignored {
        /// The ignore substring that matched
        pattern: String,
    },
    /// Title lacks a required substring
    MissingMatch {
        /// The first required substring that was absent
        pattern: String,
    },
    /// `episode` capture is not a number
    InvalidEpisode {
        /// Captured text
        capture: String,
    },
    /// `season` capture is not a number
    InvalidSeason {
        /// Captured text
        capture: String,
    },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::PatternMismatch => write!(f, "does not match episode pattern"),
            Rejection::Ignored { pattern } => write!(f, "matches ignore matcher `{pattern}`"),
            Rejection::MissingMatch { pattern } => write!(f, "does not contain `{pattern}`"),
            Rejection::InvalidEpisode { capture } => {
                write!(f, "episode capture `{capture}` is not a number")
            }
            Rejection::InvalidSeason { capture } => {
                write!(f, "season capture `{capture}` is not a number")
            }
        }
    }
}

/// Decide whether one entry is a wanted episode of `rule`
///
/// Checks run in a fixed order: pattern, ignore substrings, required substrings, then number
/// extraction. A non-numeric `episode` capture rejects the entry. A `season` capture that is
/// absent falls back to the rule's default season; one that is present but not numeric rejects
/// the entry.
pub fn evaluate(
    entry: &FeedEntry,
    rule: &SeriesRule,
    discovered_at: DateTime<Utc>,
) -> Result<CandidateEpisode, Rejection> {
    let captures = rule
        .episode_pattern
        .captures(&entry.title)
        .ok_or(Rejection::PatternMismatch)?;

    let folded = entry.title.to_lowercase();

    if let Some(pattern) = rule
        .ignore_matches
        .iter()
        .find(|p| folded.contains(&p.to_lowercase()))
    {
        return Err(Rejection::Ignored {
            pattern: pattern.clone(),
        });
    }

    if let Some(pattern) = rule
        .matches
        .iter()
        .find(|p| !folded.contains(&p.to_lowercase()))
    {
        return Err(Rejection::MissingMatch {
            pattern: pattern.clone(),
        });
    }

    // The pattern is validated to carry an `episode` group, but it may be optional in the regex
    let episode_text = captures
        .name("episode")
        .map(|m| m.as_str().trim())
        .unwrap_or_default();
    let episode = episode_text
        .parse::<u32>()
        .map_err(|_| Rejection::InvalidEpisode {
            capture: episode_text.to_string(),
        })?;

    let season = match captures.name("season") {
        Some(m) => {
            let text = m.as_str().trim();
            text.parse::<u32>().map_err(|_| Rejection::InvalidSeason {
                capture: text.to_string(),
            })?
        }
        None => rule.season,
    };

    Ok(CandidateEpisode {
        series_id: rule.id.clone(),
        name: entry.title.clone(),
        link: entry.link.clone(),
        info_hash: entry.info_hash.clone(),
        season,
        episode,
        discovered_at,
    })
}

/// Match one entry, logging the reason when it is skipped
pub fn match_entry(
    entry: &FeedEntry,
    rule: &SeriesRule,
    discovered_at: DateTime<Utc>,
) -> Option<CandidateEpisode> {
    match evaluate(entry, rule, discovered_at) {
        Ok(candidate) => Some(candidate),
        Err(reason @ (Rejection::InvalidEpisode { .. } | Rejection::InvalidSeason { .. })) => {
            warn!(series = %rule.id, title = %entry.title, %reason, "Skipping entry");
            None
        }
        Err(reason) => {
            debug!(series = %rule.id, title = %entry.title, %reason, "Entry rejected");
            None
        }
    }
}

/// Match every entry of a feed poll, preserving feed order
pub fn match_feed(
    entries: &[FeedEntry],
    rule: &SeriesRule,
    discovered_at: DateTime<Utc>,
) -> Vec<CandidateEpisode> {
    let candidates: Vec<_> = entries
        .iter()
        .filter_map(|entry| match_entry(entry, rule, discovered_at))
        .collect();
    info!(
        series = %rule.id,
        entries = entries.len(),
        matches = candidates.len(),
        "Matched feed entries"
    );
    candidates
}
