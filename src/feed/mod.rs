//! Feed source: fetches a series feed and returns its entries in feed order.
//!
//! The HTTP implementation accepts RSS 2.0 and falls back to Atom. For Nyaa feeds the
//! `nyaa:infoHash` extension is carried through so the entry's content hash is known before the
//! descriptor is downloaded.

use crate::error::{Error, FeedError, Result};
use crate::types::FeedEntry;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// User agent sent with feed and descriptor requests; Nyaa rejects obvious bot agents
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Anything that can produce the entries of a feed URL
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse one feed
    ///
    /// # Errors
    /// [`FeedError::Unreachable`] when the request fails or returns a non-success status,
    /// [`FeedError::Unparseable`] when the body is neither RSS nor Atom.
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<FeedEntry>, FeedError>;
}

/// Feed source over HTTP
pub struct HttpFeedSource {
    http_client: reqwest::Client,
}

impl HttpFeedSource {
    /// Create a feed source with its own HTTP client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = build_http_client(timeout)?;
        Ok(Self { http_client })
    }

    /// Create a feed source sharing an existing HTTP client
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

/// Build the HTTP client shared by feed and descriptor requests
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<FeedEntry>, FeedError> {
        debug!(feed = %url, "Checking feed");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Unreachable {
                url: url.to_string(),
                status: e.to_string(),
            })?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Unreachable {
                url: url.to_string(),
                status: status.as_u16().to_string(),
            });
        }

        let content = response.text().await.map_err(|e| FeedError::Unreachable {
            url: url.to_string(),
            status: format!("failed to read body: {}", e),
        })?;

        parse_feed(&content).map_err(|reason| FeedError::Unparseable {
            url: url.to_string(),
            reason,
        })
    }
}

/// Parse feed content, trying RSS first and then Atom
pub fn parse_feed(content: &str) -> std::result::Result<Vec<FeedEntry>, String> {
    match parse_as_rss(content) {
        Ok(entries) => {
            debug!("Successfully parsed as RSS, found {} items", entries.len());
            Ok(entries)
        }
        Err(rss_err) => {
            debug!("Failed to parse as RSS: {}, trying Atom", rss_err);
            match parse_as_atom(content) {
                Ok(entries) => {
                    debug!("Successfully parsed as Atom, found {} items", entries.len());
                    Ok(entries)
                }
                Err(atom_err) => Err(format!(
                    "Failed to parse feed as RSS or Atom. RSS error: {}. Atom error: {}",
                    rss_err, atom_err
                )),
            }
        }
    }
}

fn parse_as_rss(content: &str) -> std::result::Result<Vec<FeedEntry>, String> {
    let channel = content
        .parse::<rss::Channel>()
        .map_err(|e| format!("RSS parse error: {}", e))?;

    let entries = channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title().unwrap_or_default();
            let Some(link) = item
                .link()
                .or_else(|| item.enclosure().map(|enc| enc.url()))
            else {
                debug!(title = %title, "Skipping feed item without link");
                return None;
            };

            // Nyaa publishes the content hash as <nyaa:infoHash>
            let info_hash = item
                .extensions()
                .get("nyaa")
                .and_then(|ext| ext.get("infoHash"))
                .and_then(|values| values.first())
                .and_then(|value| value.value())
                .map(|hash| hash.trim().to_lowercase())
                .filter(|hash| !hash.is_empty());

            Some(FeedEntry {
                title: title.to_string(),
                link: link.to_string(),
                info_hash,
            })
        })
        .collect();

    Ok(entries)
}

fn parse_as_atom(content: &str) -> std::result::Result<Vec<FeedEntry>, String> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())
        .map_err(|e| format!("Atom parse error: {}", e))?;

    let entries = feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let title = entry.title().as_str();
            // Prefer an explicit torrent link, otherwise the primary link
            let link = entry
                .links()
                .iter()
                .find(|link| {
                    link.href().ends_with(".torrent")
                        || link.mime_type() == Some("application/x-bittorrent")
                })
                .or_else(|| entry.links().first())
                .map(|link| link.href().to_string());

            match link {
                Some(link) => Some(FeedEntry::new(title, link)),
                None => {
                    debug!(title = %title, "Skipping feed entry without link");
                    None
                }
            }
        })
        .collect();

    Ok(entries)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
