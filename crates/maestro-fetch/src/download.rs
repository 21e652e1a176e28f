//! Downloading one package release into the cache.
//!
//! Each release publishes an `endpoint.json` naming the archive URL and the
//! SHA-1 of its bytes. Downloading fetches the endpoint, fetches and unpacks
//! the archive, verifies the hash, and writes the tree under
//! `<cache>/<author>/<project>/<version>/`.

use crate::site::Site;
use crate::transport::{ArchiveProblem, HttpProblem, Transport};
use maestro_core::{Fs, PackageCache, PkgName, Version, json};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Why a package could not be downloaded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadProblem {
    #[error("endpoint request failed: {0}")]
    BadEndpointRequest(HttpProblem),
    #[error("unexpected endpoint content at {url}")]
    BadEndpointContent { url: String },
    #[error("archive request failed: {0}")]
    BadArchiveRequest(HttpProblem),
    #[error("unreadable archive at {url}")]
    BadArchiveContent { url: String },
    #[error("archive hash mismatch for {url}: expected {expected}, got {actual}")]
    BadArchiveHash {
        url: String,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    url: String,
    hash: String,
}

/// Fetch and unpack `pkg@version` into the package cache.
pub async fn download_package(
    fs: &dyn Fs,
    transport: &dyn Transport,
    site: &Site,
    cache: &PackageCache,
    pkg: PkgName,
    version: &Version,
) -> Result<(), DownloadProblem> {
    let endpoint_url = site.release_file(pkg, version, "endpoint.json");
    let bytes = transport
        .get(&endpoint_url)
        .await
        .map_err(DownloadProblem::BadEndpointRequest)?;
    let bad_endpoint = || DownloadProblem::BadEndpointContent {
        url: endpoint_url.to_string(),
    };
    let endpoint: Endpoint = json::from_slice(&bytes).map_err(|_| bad_endpoint())?;
    let archive_url = Url::parse(&endpoint.url).map_err(|_| bad_endpoint())?;

    let (sha, tree) = transport
        .get_archive(&archive_url)
        .await
        .map_err(|problem| match problem {
            ArchiveProblem::Request(e) => DownloadProblem::BadArchiveRequest(e),
            ArchiveProblem::Content(_) => DownloadProblem::BadArchiveContent {
                url: endpoint.url.clone(),
            },
        })?;

    if !sha.eq_ignore_ascii_case(&endpoint.hash) {
        warn!(pkg = %pkg, version = %version, expected = %endpoint.hash, actual = %sha, "archive hash mismatch");
        return Err(DownloadProblem::BadArchiveHash {
            url: endpoint.url,
            expected: endpoint.hash,
            actual: sha,
        });
    }

    tree.write_under(fs, &cache.package_dir(pkg, version))
        .map_err(|_| DownloadProblem::BadArchiveContent {
            url: endpoint.url.clone(),
        })?;
    info!(pkg = %pkg, version = %version, files = tree.files.len(), "package downloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveFile, ArchiveTree, sha1_hex};
    use async_trait::async_trait;
    use maestro_core::RealFs;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    /// Canned transport: endpoint bodies by URL, one archive.
    #[derive(Debug, Default)]
    struct Canned {
        bodies: BTreeMap<String, Vec<u8>>,
        archive: Option<(String, ArchiveTree)>,
    }

    #[async_trait]
    impl Transport for Canned {
        async fn get(&self, url: &Url) -> Result<Vec<u8>, HttpProblem> {
            self.bodies
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| HttpProblem::new(url, "connection refused"))
        }

        async fn get_archive(
            &self,
            url: &Url,
        ) -> Result<(String, ArchiveTree), ArchiveProblem> {
            self.archive
                .clone()
                .ok_or_else(|| ArchiveProblem::Request(HttpProblem::new(url, "no archive")))
        }
    }

    fn sample_tree() -> ArchiveTree {
        ArchiveTree::new(vec![ArchiveFile {
            path: PathBuf::from("src/Basics.elm"),
            bytes: b"module Basics exposing (..)".to_vec(),
        }])
    }

    fn endpoint_body(hash: &str) -> Vec<u8> {
        format!(r#"{{"url":"https://cdn.example.com/core.zip","hash":"{hash}"}}"#).into_bytes()
    }

    #[tokio::test]
    async fn downloads_and_unpacks() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs;
        let cache = PackageCache::new(dir.path());
        let site = Site::default();
        let pkg: PkgName = "elm/core".parse().unwrap();
        let version = Version::new(1, 0, 5);

        let sha = sha1_hex(b"archive-bytes");
        let mut transport = Canned::default();
        transport.bodies.insert(
            site.release_file(pkg, &version, "endpoint.json").to_string(),
            endpoint_body(&sha),
        );
        transport.archive = Some((sha, sample_tree()));

        download_package(&fs, &transport, &site, &cache, pkg, &version)
            .await
            .unwrap();
        assert!(fs.exists(&cache.src_dir(pkg, &version).join("Basics.elm")));
    }

    #[tokio::test]
    async fn reports_endpoint_request_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let pkg: PkgName = "elm/core".parse().unwrap();
        let result = download_package(
            &RealFs,
            &Canned::default(),
            &Site::default(),
            &cache,
            pkg,
            &Version::new(1, 0, 5),
        )
        .await;
        assert!(matches!(
            result,
            Err(DownloadProblem::BadEndpointRequest(_))
        ));
    }

    #[tokio::test]
    async fn reports_malformed_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let site = Site::default();
        let pkg: PkgName = "elm/core".parse().unwrap();
        let version = Version::new(1, 0, 5);

        let mut transport = Canned::default();
        transport.bodies.insert(
            site.release_file(pkg, &version, "endpoint.json").to_string(),
            b"<html>404</html>".to_vec(),
        );

        let result =
            download_package(&RealFs, &transport, &site, &cache, pkg, &version).await;
        assert!(matches!(
            result,
            Err(DownloadProblem::BadEndpointContent { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_hash_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs;
        let cache = PackageCache::new(dir.path());
        let site = Site::default();
        let pkg: PkgName = "elm/core".parse().unwrap();
        let version = Version::new(1, 0, 5);

        let mut transport = Canned::default();
        transport.bodies.insert(
            site.release_file(pkg, &version, "endpoint.json").to_string(),
            endpoint_body(&sha1_hex(b"expected-bytes")),
        );
        transport.archive = Some((sha1_hex(b"tampered-bytes"), sample_tree()));

        let result = download_package(&fs, &transport, &site, &cache, pkg, &version).await;
        assert!(matches!(result, Err(DownloadProblem::BadArchiveHash { .. })));
        // Nothing was written.
        assert!(!fs.exists(&cache.package_dir(pkg, &version)));
    }

    #[test]
    fn endpoint_json_shape() {
        let endpoint: Endpoint =
            json::from_slice(&endpoint_body("00ff")).unwrap();
        assert_eq!(endpoint.url, "https://cdn.example.com/core.zip");
        assert_eq!(endpoint.hash, "00ff");
    }
}
