//! Configuration types for series-dl
//!
//! The configuration file is TOML. Keys written in the older camelCase style
//! (`episodeRegex`, `targetDir`, `gracePeriod`, ...) are accepted as aliases.
//!
//! ```toml
//! [client]
//! type = "qbittorrent"
//! url = "http://localhost:8080"
//! username = "admin"
//! password = "adminadmin"
//! category = "anime"
//!
//! [[series]]
//! id = "frieren"
//! rss = "https://nyaa.si/?page=rss&q=frieren+1080p&u=SubsPlease"
//! episode_regex = 'Frieren - (?P<episode>\d+)'
//! target_dir = "/media/anime/Frieren"
//! airtime = 2023-09-29T23:00:00+09:00
//! ```

use crate::error::{Error, Result};
use crate::rule::{
    Airtime, DEFAULT_TARGET_NAME, NameTemplate, SeriesRule, compile_episode_pattern, sanitize_id,
};
use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration for series-dl
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Transfer client connection settings
    #[serde(alias = "qbt")]
    pub client: ClientConfig,

    /// Run scheduling and polling behaviour
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Ledger storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Series to watch
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

/// Supported transfer clients
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// qBittorrent Web API v2
    #[default]
    #[serde(alias = "qbt")]
    QBittorrent,
}

/// Transfer client connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Which client implementation to use
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: ClientKind,

    /// Web UI base URL (e.g., "http://localhost:8080")
    #[serde(alias = "uri")]
    pub url: String,

    /// Username for authentication
    #[serde(default, alias = "user", alias = "email")]
    pub username: Option<String>,

    /// Password for authentication
    #[serde(default, alias = "pass")]
    pub password: Option<String>,

    /// Category label applied to added torrents
    #[serde(default)]
    pub category: Option<String>,
}

/// Run scheduling and polling behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA zone used for airtimes that carry no offset (default: "Asia/Tokyo")
    #[serde(default = "default_reference_timezone")]
    pub reference_timezone: String,

    /// Series processed concurrently per batch (default: 3)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between transfer status polls (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Consecutive polls a job may be missing from the client before failing (default: 5)
    #[serde(default = "default_missing_poll_budget")]
    pub missing_poll_budget: u32,

    /// Timeout for feed, descriptor and client HTTP requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            reference_timezone: default_reference_timezone(),
            batch_size: default_batch_size(),
            poll_interval: default_poll_interval(),
            missing_poll_budget: default_missing_poll_budget(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ScheduleConfig {
    /// Parse the reference timezone
    pub fn timezone(&self) -> Result<Tz> {
        self.reference_timezone.parse::<Tz>().map_err(|_| {
            Error::config(
                "schedule.reference_timezone",
                format!("'{}' is not a valid IANA timezone", self.reference_timezone),
            )
        })
    }
}

/// Ledger storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database holding acquired episodes (default: "series-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Raw per-series settings as written in the configuration file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Stable identifier; generated from the feed URL when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Nyaa RSS feed URL
    #[serde(alias = "url", alias = "uri")]
    pub rss: String,

    /// Title pattern with a named `episode` group (and optional `season` group)
    #[serde(alias = "episodeRegex")]
    pub episode_regex: String,

    /// Library directory for finished episodes
    #[serde(alias = "targetDir")]
    pub target_dir: PathBuf,

    /// File name template (default: "Episode S{season:02}E{episode:02}")
    #[serde(default = "default_target_name", alias = "targetName")]
    pub target_name: String,

    /// Season used when the title does not carry one (default: 1)
    #[serde(default = "default_season")]
    pub season: u32,

    /// Substrings that must all appear in the title
    #[serde(default)]
    pub matches: Vec<String>,

    /// Substrings that reject the title
    #[serde(default, alias = "ignoreMatches")]
    pub ignore_matches: Vec<String>,

    /// Expected weekly airtime
    #[serde(default)]
    pub airtime: Option<Airtime>,

    /// Minutes of tolerance around the airtime (default: 120)
    #[serde(default = "default_grace_period", alias = "gracePeriod")]
    pub grace_period: u32,

    /// Ignore episodes numbered below this (default: 0)
    #[serde(default, alias = "startFrom")]
    pub start_from: u32,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Reading config");
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })
    }

    /// Validate settings and build the rule set consumed by the pipeline
    ///
    /// Any invalid entry aborts the whole run.
    pub fn validate(&self) -> Result<Vec<SeriesRule>> {
        validate_client_url(&self.client.url)?;
        self.schedule.timezone()?;
        if self.schedule.batch_size == 0 {
            return Err(Error::config(
                "schedule.batch_size",
                "Batch size must be at least 1",
            ));
        }

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(self.series.len());
        for (idx, series) in self.series.iter().enumerate() {
            let rule = series.to_rule(idx)?;
            if !seen.insert(rule.id.clone()) {
                return Err(Error::config(
                    format!("series.{idx}.id"),
                    format!("Duplicate series id `{}`", rule.id),
                ));
            }
            rules.push(rule);
        }
        Ok(rules)
    }
}

impl SeriesConfig {
    /// Validate this entry (at position `idx`) into a [`SeriesRule`]
    pub fn to_rule(&self, idx: usize) -> Result<SeriesRule> {
        let key = |field: &str| format!("series.{idx}.{field}");

        let id = match &self.id {
            Some(id) => {
                let safe = sanitize_id(id);
                if safe != *id {
                    warn!(feed = %self.rss, id = %safe, "Provided ID is unsafe, using cleaned ID");
                }
                safe
            }
            None => {
                let id = generated_id(&self.rss);
                warn!(feed = %self.rss, id = %id, "No ID provided for feed, using generated ID");
                id
            }
        };

        validate_feed_url(&self.rss).map_err(|message| Error::config(key("rss"), message))?;

        let episode_pattern = compile_episode_pattern(&self.episode_regex)
            .map_err(|message| Error::config(key("episode_regex"), message))?;

        let target_name = NameTemplate::parse(&self.target_name)
            .map_err(|message| Error::config(key("target_name"), message))?;

        if !self.target_dir.exists() {
            warn!(
                series = %id,
                target_dir = %self.target_dir.display(),
                "Target directory does not exist yet"
            );
        }

        Ok(SeriesRule {
            id,
            feed_url: self.rss.clone(),
            episode_pattern,
            season: self.season,
            matches: self.matches.clone(),
            ignore_matches: self.ignore_matches.clone(),
            airtime: self.airtime,
            grace_period: TimeDelta::minutes(i64::from(self.grace_period)),
            target_dir: self.target_dir.clone(),
            target_name,
            start_from: self.start_from,
        })
    }
}

/// Deterministic ID for a series without one: `series-` plus 12 hex digits of the URL's SHA-1
fn generated_id(feed_url: &str) -> String {
    let digest = format!("{:x}", Sha1::digest(feed_url.as_bytes()));
    format!("series-{}", &digest[..12])
}

fn validate_feed_url(raw: &str) -> std::result::Result<(), String> {
    let url = url::Url::parse(raw).map_err(|e| format!("Invalid URL: {e}"))?;
    let host = url.host_str().unwrap_or_default();
    if host != "nyaa.si" && !host.ends_with(".nyaa.si") {
        return Err("Invalid URL, not a Nyaa.si link".to_string());
    }
    let is_rss = url
        .query_pairs()
        .any(|(k, v)| k == "page" && v == "rss");
    if !is_rss {
        return Err("Invalid URL, not a Nyaa RSS link".to_string());
    }
    Ok(())
}

fn validate_client_url(raw: &str) -> Result<()> {
    let url = url::Url::parse(raw)
        .map_err(|e| Error::config("client.url", format!("Invalid URL: {e}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::config(
            "client.url",
            "Invalid URL, missing domain/host",
        ));
    }
    if !matches!(url.scheme(), "http" | "https") && url.port().is_none() {
        return Err(Error::config(
            "client.url",
            "Invalid URL, use an HTTP scheme or provide a port",
        ));
    }
    Ok(())
}

// Default value functions
fn default_reference_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_batch_size() -> usize {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_missing_poll_budget() -> u32 {
    5
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("series-dl.db")
}

fn default_target_name() -> String {
    DEFAULT_TARGET_NAME.to_string()
}

fn default_season() -> u32 {
    1
}

fn default_grace_period() -> u32 {
    120
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
