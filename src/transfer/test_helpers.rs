//! Shared test helpers: a scripted in-memory transfer client and descriptor builders.

use crate::client::{JobInfo, JobState, TransferClient};
use crate::error::{Error, Result};
use crate::torrent::TorrentDescriptor;
use crate::types::CandidateEpisode;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the scripted client answers to one status poll
#[derive(Clone, Copy, Debug)]
pub(crate) enum Poll {
    Missing,
    Active,
    Complete,
    Errored,
    Fail,
}

/// In-memory transfer client replaying the same poll script for every job
pub(crate) struct ScriptedClient {
    script: Vec<Poll>,
    save_path: PathBuf,
    reject_names: Vec<String>,
    panic_names: Vec<String>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    cursors: Mutex<HashMap<String, usize>>,
    jobs: Mutex<HashMap<String, String>>,
    pub added: Mutex<Vec<(String, Option<String>)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub(crate) fn new(script: Vec<Poll>, save_path: impl Into<PathBuf>) -> Self {
        Self {
            script,
            save_path: save_path.into(),
            reject_names: Vec::new(),
            panic_names: Vec::new(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            cursors: Mutex::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
            added: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Refuse descriptors whose torrent name is `name`
    pub(crate) fn rejecting(mut self, name: &str) -> Self {
        self.reject_names.push(name.to_string());
        self
    }

    /// Panic when asked to add the torrent named `name`
    pub(crate) fn panicking(mut self, name: &str) -> Self {
        self.panic_names.push(name.to_string());
        self
    }

    /// Most jobs ever held between add and delete at the same time
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn polls_for(&self, id: &str) -> usize {
        self.cursors.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl TransferClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn login(&self) -> Result<()> {
        Ok(())
    }

    async fn add(&self, descriptor: &[u8], category: Option<&str>) -> Result<bool> {
        let parsed = TorrentDescriptor::parse(descriptor).map_err(Error::Other)?;
        if self.panic_names.contains(&parsed.name) {
            panic!("unexpected client fault");
        }
        if self.reject_names.contains(&parsed.name) {
            return Ok(false);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.added
            .lock()
            .unwrap()
            .push((parsed.name.clone(), category.map(str::to_string)));
        self.jobs
            .lock()
            .unwrap()
            .insert(parsed.info_hash, parsed.name);
        Ok(true)
    }

    async fn job(&self, id: &str) -> Result<Option<JobInfo>> {
        let step = {
            let mut cursors = self.cursors.lock().unwrap();
            let cursor = cursors.entry(id.to_string()).or_insert(0);
            let step = self
                .script
                .get(*cursor)
                .or(self.script.last())
                .copied()
                .unwrap_or(Poll::Missing);
            *cursor += 1;
            step
        };
        let listed = self.jobs.lock().unwrap().contains_key(id);

        let state = match step {
            Poll::Missing => return Ok(None),
            Poll::Fail => return Err(Error::Client("connection refused".into())),
            Poll::Active => JobState::Active,
            Poll::Complete => JobState::Complete,
            Poll::Errored => JobState::Errored,
        };
        Ok(listed.then(|| JobInfo {
            id: id.to_string(),
            state,
            save_path: self.save_path.clone(),
            progress: if state == JobState::Complete { 1.0 } else { 0.5 },
        }))
    }

    async fn files(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.jobs.lock().unwrap().get(id).cloned().into_iter().collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

/// Bencoded single-file descriptor for `file_name`
pub(crate) fn single_file_torrent(file_name: &str) -> Vec<u8> {
    format!(
        "d8:announce15:http://tracker/4:infod6:lengthi1024e4:name{}:{}12:piece lengthi16384e6:pieces0:ee",
        file_name.len(),
        file_name
    )
    .into_bytes()
}

/// Bencoded descriptor with two payload files
pub(crate) fn multi_file_torrent() -> Vec<u8> {
    b"d4:infod5:filesld6:lengthi10e4:pathl5:a.mkveed6:lengthi20e4:pathl5:b.mkveee4:name4:packee"
        .to_vec()
}

/// Candidate for episode `episode` (season 1) whose descriptor lives at `link`
pub(crate) fn candidate(series_id: &str, episode: u32, link: String) -> CandidateEpisode {
    CandidateEpisode {
        series_id: series_id.to_string(),
        name: format!("Show Name - {episode:02} [1080p]"),
        link,
        info_hash: None,
        season: 1,
        episode,
        discovered_at: Utc::now(),
    }
}
