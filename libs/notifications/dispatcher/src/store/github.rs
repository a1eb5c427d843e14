//! GitHub repository contents as a content store
//!
//! Uses the REST contents endpoint:
//! `GET /repos/{owner}/{repo}/contents/{path}?ref={revision}`.
//! File bodies arrive base64-encoded (wrapped at 60 columns) inside a JSON
//! envelope.

use super::{normalize_path, ContentStore};
use crate::error::StoreError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("email-dispatcher/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`GithubContentStore`]
#[derive(Debug, Clone)]
pub struct GithubStoreConfig {
    /// API base, e.g. `https://api.github.com`
    pub api_url: String,
    /// `owner/repo`
    pub repository: String,
    /// Branch, tag or commit every fetch is pinned to
    pub revision: String,
    /// Optional bearer token for private repositories
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl GithubStoreConfig {
    pub fn new(repository: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            repository: repository.into(),
            revision: revision.into(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// JSON envelope returned for a file
#[derive(Debug, Deserialize)]
struct ContentPayload {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Content store backed by a GitHub repository
pub struct GithubContentStore {
    client: Client,
    config: GithubStoreConfig,
    base: Url,
}

impl GithubContentStore {
    pub fn new(config: GithubStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        let invalid_base = |reason: String| StoreError::InvalidPath {
            path: config.api_url.clone(),
            reason,
        };
        let base = Url::parse(&config.api_url).map_err(|e| invalid_base(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid_base("not a base URL".to_string()));
        }

        Ok(Self {
            client,
            config,
            base,
        })
    }

    /// `{api}/repos/{owner}/{repo}/contents/{relative}`, one URL segment per
    /// path segment.
    ///
    /// Segments are percent-encoded, so `?` and `#` stay part of the file
    /// name and cannot add a query. Empty, `.` and `..` segments are refused
    /// so a path never leaves the contents of the configured repository.
    fn url_for(&self, relative: &str) -> Result<Url, StoreError> {
        if relative
            .split('/')
            .any(|segment| matches!(segment, "" | "." | ".."))
        {
            return Err(StoreError::InvalidPath {
                path: relative.to_string(),
                reason: "empty or relative path segment".to_string(),
            });
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidPath {
                path: self.config.api_url.clone(),
                reason: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .push("repos")
            .extend(self.config.repository.split('/'))
            .push("contents")
            .extend(relative.split('/'));

        Ok(url)
    }
}

/// Turn the contents envelope into text; empty files count as absent
fn decode_payload(path: &str, payload: ContentPayload) -> Result<Option<String>, StoreError> {
    let bytes = match payload.encoding.as_deref() {
        Some("base64") => {
            let compact: String = payload
                .content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            STANDARD.decode(compact).map_err(|e| StoreError::Decode {
                path: path.to_string(),
                reason: e.to_string(),
            })?
        }
        // Files above 1 MB come back with encoding "none" and no inline content
        Some("none") => {
            return Err(StoreError::Decode {
                path: path.to_string(),
                reason: "file too large for the contents API".to_string(),
            })
        }
        _ => payload.content.into_bytes(),
    };

    if bytes.is_empty() {
        return Ok(None);
    }

    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| StoreError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl ContentStore for GithubContentStore {
    async fn fetch(&self, path: &str) -> Result<Option<String>, StoreError> {
        let relative = normalize_path(path);
        let url = self.url_for(relative)?;

        debug!(
            repository = %self.config.repository,
            revision = %self.config.revision,
            path = %relative,
            "Fetching content"
        );

        let mut request = self
            .client
            .get(url)
            .query(&[("ref", self.config.revision.as_str())])
            .header(ACCEPT, "application/vnd.github+json");

        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(path = %relative, "Content not found");
            return Ok(None);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(path = %relative, status = %status, "Content store rejected credentials");
            return Err(StoreError::Unauthorized {
                path: relative.to_string(),
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                path: relative.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        // Directories come back as arrays and fail here
        let payload: ContentPayload =
            serde_json::from_str(&text).map_err(|e| StoreError::Decode {
                path: relative.to_string(),
                reason: e.to_string(),
            })?;

        decode_payload(relative, payload)
    }
}
