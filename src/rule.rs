//! Validated per-series rules
//!
//! A [`SeriesRule`] is what the pipeline consumes: every field has already been checked by
//! [`Config::validate`](crate::config::Config::validate), so the episode pattern is known to carry an
//! `episode` group and the target name template is known to reference the episode number.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default grace period around the expected airtime, in minutes
pub const DEFAULT_GRACE_MINUTES: i64 = 120;

/// Default library file name for finished episodes
pub const DEFAULT_TARGET_NAME: &str = "Episode S{season:02}E{episode:02}";

/// One episodic feed and how to recognise and file its episodes
#[derive(Clone, Debug)]
pub struct SeriesRule {
    /// Stable identifier, restricted to `[A-Za-z0-9_-]`
    pub id: String,

    /// RSS feed URL
    pub feed_url: String,

    /// Pattern applied to entry titles; always has an `episode` group
    pub episode_pattern: Regex,

    /// Season used when the pattern does not capture one
    pub season: u32,

    /// Substrings that must all appear in the title (case-insensitive)
    pub matches: Vec<String>,

    /// Substrings that reject the entry when any appears (case-insensitive)
    pub ignore_matches: Vec<String>,

    /// Expected weekly airtime; `None` means check on every run
    pub airtime: Option<Airtime>,

    /// Tolerance on both sides of the airtime
    pub grace_period: TimeDelta,

    /// Library directory for finished files
    pub target_dir: PathBuf,

    /// File name template (without extension)
    pub target_name: NameTemplate,

    /// Episodes below this number are ignored unless the floor is bypassed
    pub start_from: u32,
}

impl SeriesRule {
    /// Create a rule with default season, grace period, template and no filters
    ///
    /// # Errors
    /// Returns a configuration error if the pattern does not compile or lacks an `episode` group.
    pub fn new(
        id: impl Into<String>,
        feed_url: impl Into<String>,
        episode_pattern: &str,
        target_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let episode_pattern = compile_episode_pattern(episode_pattern)
            .map_err(|message| Error::config("episode_regex", message))?;
        let target_name = NameTemplate::parse(DEFAULT_TARGET_NAME)
            .map_err(|message| Error::config("target_name", message))?;

        Ok(Self {
            id: sanitize_id(&id.into()),
            feed_url: feed_url.into(),
            episode_pattern,
            season: 1,
            matches: Vec::new(),
            ignore_matches: Vec::new(),
            airtime: None,
            grace_period: TimeDelta::minutes(DEFAULT_GRACE_MINUTES),
            target_dir: target_dir.into(),
            target_name,
            start_from: 0,
        })
    }

    /// Set the default season
    pub fn season(mut self, season: u32) -> Self {
        self.season = season;
        self
    }

    /// Set the required substrings
    pub fn matches(mut self, matches: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.matches = matches.into_iter().map(Into::into).collect();
        self
    }

    /// Set the rejecting substrings
    pub fn ignore_matches(mut self, ignore: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore_matches = ignore.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expected airtime
    pub fn airtime(mut self, airtime: Airtime) -> Self {
        self.airtime = Some(airtime);
        self
    }

    /// Set the grace period
    pub fn grace_period(mut self, grace: TimeDelta) -> Self {
        self.grace_period = grace;
        self
    }

    /// Set the target name template
    pub fn target_name(mut self, template: NameTemplate) -> Self {
        self.target_name = template;
        self
    }

    /// Set the minimum episode number
    pub fn start_from(mut self, episode: u32) -> Self {
        self.start_from = episode;
        self
    }
}

/// Compile an episode pattern, stripping `/.../` delimiters and requiring an `episode` group
pub fn compile_episode_pattern(raw: &str) -> std::result::Result<Regex, String> {
    let pattern = raw
        .strip_prefix('/')
        .and_then(|p| p.strip_suffix('/'))
        .unwrap_or(raw);

    let regex = regex::RegexBuilder::new(pattern)
        .size_limit(1024 * 1024)
        .build()
        .map_err(|e| format!("Invalid regex: {e}"))?;

    if !regex.capture_names().flatten().any(|name| name == "episode") {
        return Err("Invalid regex, need `episode` group match".to_string());
    }

    Ok(regex)
}

/// Replace every character outside `[A-Za-z0-9_-]` with an underscore
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Expected airtime of a series
///
/// Only the weekday and time of day matter to the airtime gate; the date anchors the weekday.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Airtime {
    /// A date without a time; airs at midnight in the reference zone
    Date(NaiveDate),
    /// A date-time without an offset; interpreted in the reference zone
    Local(NaiveDateTime),
    /// A date-time carrying its own UTC offset
    Zoned(DateTime<FixedOffset>),
}

impl Airtime {
    /// Weekday the series airs on
    pub fn weekday(&self) -> chrono::Weekday {
        match self {
            Airtime::Date(d) => d.weekday(),
            Airtime::Local(dt) => dt.weekday(),
            Airtime::Zoned(dt) => dt.weekday(),
        }
    }

    /// Time of day the series airs at
    pub fn time(&self) -> NaiveTime {
        match self {
            Airtime::Date(_) => NaiveTime::MIN,
            Airtime::Local(dt) => dt.time(),
            Airtime::Zoned(dt) => dt.time(),
        }
    }

    /// Explicit offset, if the value carries one
    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            Airtime::Zoned(dt) => Some(*dt.offset()),
            Airtime::Date(_) | Airtime::Local(_) => None,
        }
    }
}

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

impl FromStr for Airtime {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Airtime::Zoned(dt));
        }
        for fmt in LOCAL_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Airtime::Local(dt));
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Airtime::Date)
            .map_err(|_| format!("Invalid airtime `{s}`, expected a date or date-time"))
    }
}

impl fmt::Display for Airtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Airtime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Airtime::Local(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Airtime::Zoned(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl Serialize for Airtime {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Airtime {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AirtimeVisitor)
    }
}

struct AirtimeVisitor;

impl<'de> serde::de::Visitor<'de> for AirtimeVisitor {
    type Value = Airtime;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a date or date-time")
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Airtime, E>
    where
        E: serde::de::Error,
    {
        v.parse().map_err(E::custom)
    }

    // TOML date/time literals arrive as a single-entry map wrapping their text form
    fn visit_map<A>(self, mut map: A) -> std::result::Result<Airtime, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let (_, text) = map
            .next_entry::<String, String>()?
            .ok_or_else(|| serde::de::Error::custom("empty airtime value"))?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Placeholder in a [`NameTemplate`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Season,
    Episode,
    Series,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field { field: Field, width: usize },
}

/// Library file name template such as `Episode S{season:02}E{episode:02}`
///
/// Placeholders: `{season}`, `{episode}`, `{series}`. A `:0N` spec zero-pads to `N` digits
/// (a trailing `d` is accepted for compatibility). `{{` and `}}` are literal braces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl NameTemplate {
    /// Parse a template, requiring an `episode` placeholder
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut spec = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => spec.push(ch),
                            None => return Err(format!("Unclosed placeholder in `{raw}`")),
                        }
                    }
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(parse_placeholder(&spec)?);
                }
                '}' => return Err(format!("Unmatched `}}` in `{raw}`")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        let has_episode = parts.iter().any(|p| {
            matches!(
                p,
                Part::Field {
                    field: Field::Episode,
                    ..
                }
            )
        });
        if !has_episode {
            return Err("Invalid format, need `episode` key".to_string());
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    /// Template source text
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Render the template for one episode
    pub fn render(&self, series_id: &str, season: u32, episode: u32) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Field { field, width } => {
                    let value = match field {
                        Field::Season => season.to_string(),
                        Field::Episode => episode.to_string(),
                        Field::Series => series_id.to_string(),
                    };
                    if value.len() < *width {
                        out.extend(std::iter::repeat_n('0', width - value.len()));
                    }
                    out.push_str(&value);
                }
            }
        }
        out
    }
}

fn parse_placeholder(spec: &str) -> std::result::Result<Part, String> {
    let (name, format) = match spec.split_once(':') {
        Some((name, format)) => (name.trim(), Some(format.trim())),
        None => (spec.trim(), None),
    };

    let field = match name {
        "season" => Field::Season,
        "episode" => Field::Episode,
        "series" => Field::Series,
        other => return Err(format!("Unknown placeholder `{{{other}}}`")),
    };

    let width = match format {
        None | Some("") => 0,
        Some(f) => {
            let digits = f.strip_suffix('d').unwrap_or(f);
            let digits = digits.strip_prefix('0').unwrap_or(digits);
            let digits = digits.strip_prefix('>').unwrap_or(digits);
            digits
                .parse::<usize>()
                .map_err(|_| format!("Invalid width `{f}` for `{name}`"))?
        }
    };

    Ok(Part::Field { field, width })
}
