//! qBittorrent Web API v2 client

use super::traits::{JobInfo, JobState, TransferClient};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Torrent entry from `/api/v2/torrents/info`
#[derive(Debug, Deserialize)]
struct TorrentInfo {
    hash: String,
    state: String,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    progress: f64,
}

/// File entry from `/api/v2/torrents/files`
#[derive(Debug, Deserialize)]
struct TorrentFile {
    name: String,
}

/// Map a qBittorrent state string onto [`JobState`]
pub fn job_state(state: &str) -> JobState {
    match state {
        "error" | "missingFiles" => JobState::Errored,
        "uploading" | "stalledUP" | "pausedUP" | "stoppedUP" | "queuedUP" | "forcedUP"
        | "checkingUP" => JobState::Complete,
        _ => JobState::Active,
    }
}

/// Transfer client backed by the qBittorrent Web UI
pub struct QBittorrentClient {
    http_client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    sid: RwLock<Option<String>>,
}

impl QBittorrentClient {
    /// Create a client for the Web UI at `base_url`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(
        base_url: &str,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            sid: RwLock::new(None),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v2{}", self.base_url, endpoint)
    }

    async fn with_sid(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.sid.read().await.as_deref() {
            Some(sid) => request.header(reqwest::header::COOKIE, format!("SID={}", sid)),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self.with_sid(request).await.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Client(
                "qBittorrent refused the request (not logged in or session expired)".into(),
            ));
        }
        Ok(response)
    }

    async fn expect_success(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::Client(format!(
            "{} failed: HTTP {} {}",
            action,
            status.as_u16(),
            message.trim()
        )))
    }
}

#[async_trait]
impl TransferClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qBittorrent"
    }

    async fn login(&self) -> Result<()> {
        let Some(username) = self.username.as_deref() else {
            debug!("No qBittorrent username configured, skipping login");
            return Ok(());
        };
        let password = self.password.as_deref().unwrap_or_default();

        let params = [("username", username), ("password", password)];
        let response = self
            .http_client
            .post(self.url("/auth/login"))
            .header(reqwest::header::REFERER, &self.base_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();

        // Extract SID from "SID=xxx; path=/"
        let sid = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| {
                cookie
                    .split(';')
                    .next()
                    .and_then(|s| s.trim().strip_prefix("SID="))
                    .map(str::to_string)
            });
        if let Some(sid) = sid {
            *self.sid.write().await = Some(sid);
            debug!("Saved SID from login response");
        }

        let body = response.text().await.unwrap_or_default();

        if status.is_success() && body.trim() == "Ok." {
            debug!("Successfully logged in to qBittorrent");
            Ok(())
        } else if body.trim() == "Fails." {
            Err(Error::Client("Invalid username or password".into()))
        } else {
            Err(Error::Client(format!(
                "Login failed: {} - {}",
                status.as_u16(),
                body.trim()
            )))
        }
    }

    async fn add(&self, descriptor: &[u8], category: Option<&str>) -> Result<bool> {
        let part = Part::bytes(descriptor.to_vec())
            .file_name("episode.torrent")
            .mime_str("application/x-bittorrent")?;
        let mut form = Form::new().part("torrents", part);
        if let Some(category) = category {
            form = form
                .text("category", category.to_string())
                .text("autoTMM", "true");
        }

        let response = self
            .send(self.http_client.post(self.url("/torrents/add")).multipart(form))
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNSUPPORTED_MEDIA_TYPE {
            return Ok(false);
        }
        let response = Self::expect_success(response, "Adding torrent").await?;

        // Older versions answer 200 with "Fails." instead of 415
        let body = response.text().await.unwrap_or_default();
        Ok(body.trim() != "Fails.")
    }

    async fn job(&self, id: &str) -> Result<Option<JobInfo>> {
        let response = self
            .send(
                self.http_client
                    .get(self.url("/torrents/info"))
                    .query(&[("hashes", id)]),
            )
            .await?;
        let response = Self::expect_success(response, "Listing torrents").await?;

        let torrents = response.json::<Vec<TorrentInfo>>().await?;
        Ok(torrents
            .into_iter()
            .find(|t| t.hash.eq_ignore_ascii_case(id))
            .map(|t| JobInfo {
                id: t.hash,
                state: job_state(&t.state),
                save_path: PathBuf::from(t.save_path),
                progress: t.progress,
            }))
    }

    async fn files(&self, id: &str) -> Result<Vec<String>> {
        let response = self
            .send(
                self.http_client
                    .get(self.url("/torrents/files"))
                    .query(&[("hash", id)]),
            )
            .await?;
        let response = Self::expect_success(response, "Listing torrent files").await?;

        let files = response.json::<Vec<TorrentFile>>().await?;
        Ok(files.into_iter().map(|f| f.name).collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let params = [("hashes", id), ("deleteFiles", "false")];
        let response = self
            .send(
                self.http_client
                    .post(self.url("/torrents/delete"))
                    .form(&params),
            )
            .await?;
        Self::expect_success(response, "Deleting torrent").await?;
        Ok(())
    }
}
