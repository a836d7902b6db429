//! Dedup ledger: which episodes of a series have already been acquired
//!
//! The ledger is partitioned by series ID. Each series maps seasons to the set of episode numbers
//! that were downloaded and relocated successfully. Storage is abstracted behind [`LedgerStore`];
//! the coordinator loads one series at a time and commits that series' successes in one call.

use crate::error::Result;
use crate::types::CandidateEpisode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Acquired episodes of one series, keyed by season
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DedupRecord {
    seasons: BTreeMap<u32, BTreeSet<u32>>,
}

impl DedupRecord {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an episode; returns `false` if it was already present
    pub fn insert(&mut self, season: u32, episode: u32) -> bool {
        self.seasons.entry(season).or_default().insert(episode)
    }

    /// Whether an episode is recorded under `season`
    pub fn contains(&self, season: u32, episode: u32) -> bool {
        self.seasons
            .get(&season)
            .is_some_and(|episodes| episodes.contains(&episode))
    }

    /// Total recorded episodes across seasons
    pub fn len(&self) -> usize {
        self.seasons.values().map(BTreeSet::len).sum()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(u32, u32)> for DedupRecord {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (season, episode) in iter {
            record.insert(season, episode);
        }
        record
    }
}

/// An episode to be recorded after a successful handoff
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquiredEpisode {
    /// Season key
    pub season: u32,
    /// Episode number
    pub episode: u32,
    /// Feed entry title
    pub title: String,
    /// Library path the payload was moved to
    pub path: PathBuf,
    /// When the handoff finished
    pub acquired_at: DateTime<Utc>,
}

/// Durable per-series storage for [`DedupRecord`]s
///
/// Implementations must treat committing an already-recorded episode as a no-op.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load everything acquired for one series
    async fn load(&self, series_id: &str) -> Result<DedupRecord>;

    /// Record a batch of acquired episodes for one series atomically
    async fn commit(&self, series_id: &str, episodes: &[AcquiredEpisode]) -> Result<()>;
}

/// Season under which a candidate is looked up in, and recorded to, the ledger
///
/// Always the candidate's resolved season. When the title carries no season the matcher has
/// already resolved it to the rule's default, so the default-season fallback and the resolved
/// season are the same key.
pub fn ledger_season(candidate: &CandidateEpisode) -> u32 {
    candidate.season
}

/// Whether a candidate still needs downloading
pub fn is_eligible(record: &DedupRecord, candidate: &CandidateEpisode) -> bool {
    !record.contains(ledger_season(candidate), candidate.episode)
}

/// Drop already-acquired candidates and, unless bypassed, those below `start_from`
///
/// Keeps the first candidate for each (season, episode) so a feed listing the same episode twice
/// (different releases) launches a single job.
pub fn filter_eligible(
    candidates: Vec<CandidateEpisode>,
    record: &DedupRecord,
    start_from: Option<u32>,
) -> Vec<CandidateEpisode> {
    let mut seen = BTreeSet::new();
    candidates
        .into_iter()
        .filter(|c| start_from.is_none_or(|floor| c.episode >= floor))
        .filter(|c| is_eligible(record, c))
        .filter(|c| seen.insert((ledger_season(c), c.episode)))
        .collect()
}
