//! A canned transport for tests.

use async_trait::async_trait;
use dashmap::DashMap;
use maestro_fetch::{ArchiveProblem, ArchiveTree, HttpProblem, Transport};
use url::Url;

/// Serves pre-registered responses by exact URL; everything else fails like
/// an unreachable network.
#[derive(Debug, Default)]
pub struct CannedTransport {
    bodies: DashMap<String, Vec<u8>>,
    archives: DashMap<String, (String, ArchiveTree)>,
}

impl CannedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response body for `url`.
    pub fn serve(&self, url: &Url, body: impl Into<Vec<u8>>) {
        self.bodies.insert(url.to_string(), body.into());
    }

    /// Register an archive (sha + unpacked tree) for `url`.
    pub fn serve_archive(&self, url: &Url, sha: impl Into<String>, tree: ArchiveTree) {
        self.archives.insert(url.to_string(), (sha.into(), tree));
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, HttpProblem> {
        self.bodies
            .get(url.as_str())
            .map(|entry| entry.clone())
            .ok_or_else(|| HttpProblem::new(url, "connection refused"))
    }

    async fn get_archive(&self, url: &Url) -> Result<(String, ArchiveTree), ArchiveProblem> {
        self.archives
            .get(url.as_str())
            .map(|entry| entry.clone())
            .ok_or_else(|| ArchiveProblem::Request(HttpProblem::new(url, "connection refused")))
    }
}
