//! The HTTP collaborator interface.
//!
//! The engine never talks to the network directly; everything goes through
//! [`Transport`]. The production implementation is a thin [`reqwest`]
//! wrapper; tests substitute canned responses.

use crate::archive::{ArchiveTree, sha1_hex};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// A failed HTTP exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{url}: {message}")]
pub struct HttpProblem {
    pub url: String,
    pub message: String,
}

impl HttpProblem {
    pub fn new(url: &Url, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// A failed archive fetch, split by stage so callers can tell a transport
/// failure from an unreadable payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArchiveProblem {
    #[error("archive request failed: {0}")]
    Request(HttpProblem),
    #[error("archive content unreadable: {0}")]
    Content(HttpProblem),
}

/// HTTP access, as seen by the engine.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Fetch a URL, returning the response body.
    async fn get(&self, url: &Url) -> Result<Vec<u8>, HttpProblem>;

    /// Fetch an archive, returning the SHA-1 hex digest of the raw bytes and
    /// the unpacked file tree.
    async fn get_archive(&self, url: &Url) -> Result<(String, ArchiveTree), ArchiveProblem>;
}

/// Production transport over reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("maestro/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, HttpProblem> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| HttpProblem::new(url, e.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpProblem::new(url, e.to_string()))?;
        Ok(body.to_vec())
    }

    async fn get_archive(&self, url: &Url) -> Result<(String, ArchiveTree), ArchiveProblem> {
        let bytes = self.get(url).await.map_err(ArchiveProblem::Request)?;
        let sha = sha1_hex(&bytes);
        let tree = ArchiveTree::from_zip(&bytes)
            .map_err(|e| ArchiveProblem::Content(HttpProblem::new(url, e.to_string())))?;
        debug!(url = %url, files = tree.files.len(), sha = %sha, "archive unpacked");
        Ok((sha, tree))
    }
}
