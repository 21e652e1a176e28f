//! The package registry client.
//!
//! The registry is the cumulative set of known `(package, version)` pairs.
//! It lives at `<home>/registry.dat` and is refreshed from the package site:
//! a full listing on first contact, incremental `since/<count>` updates
//! afterwards. When neither the cached file nor the network is available, a
//! registry can be synthesized from whatever is already unpacked in the
//! package cache.

use maestro_core::{Fs, PackageCache, PkgName, Version, dat, json, parse_version};
use maestro_fetch::{HttpProblem, Site, Transport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;
use tracing::{debug, info};

/// Why the registry could not be obtained or refreshed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryProblem {
    #[error("registry request failed: {0}")]
    Http(HttpProblem),
    #[error("unexpected registry content at {url}")]
    Data { url: String },
}

/// Every known version of one package.
///
/// `previous` is sorted newest first; `newest` is strictly newer than all of
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownVersions {
    pub newest: Version,
    pub previous: Vec<Version>,
}

impl KnownVersions {
    #[must_use]
    pub fn one(version: Version) -> Self {
        Self {
            newest: version,
            previous: Vec::new(),
        }
    }

    /// Record a newly published version.
    pub fn add(&mut self, version: Version) {
        if version == self.newest || self.previous.contains(&version) {
            return;
        }
        if version > self.newest {
            let old = std::mem::replace(&mut self.newest, version);
            self.previous.insert(0, old);
        } else {
            let at = self
                .previous
                .partition_point(|existing| *existing > version);
            self.previous.insert(at, version);
        }
    }

    /// All versions, newest first.
    pub fn descending(&self) -> impl Iterator<Item = &Version> {
        std::iter::once(&self.newest).chain(self.previous.iter())
    }

    /// How many versions are known, the newest included.
    #[must_use]
    pub fn total(&self) -> u64 {
        1 + self.previous.len() as u64
    }
}

fn add_known(packages: &mut BTreeMap<PkgName, KnownVersions>, pkg: PkgName, version: Version) {
    match packages.entry(pkg) {
        std::collections::btree_map::Entry::Occupied(mut entry) => entry.get_mut().add(version),
        std::collections::btree_map::Entry::Vacant(entry) => {
            entry.insert(KnownVersions::one(version));
        }
    }
}

/// The cumulative registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Total number of known versions across all packages, used as the
    /// cursor for incremental updates.
    pub count: u64,
    pub packages: BTreeMap<PkgName, KnownVersions>,
}

impl Registry {
    /// Read the cached registry, if a recognizable one exists.
    #[must_use]
    pub fn read(fs: &dyn Fs, cache: &PackageCache) -> Option<Self> {
        dat::read(fs, &cache.registry_file())
    }

    /// Persist this registry as `registry.dat`.
    pub fn write(&self, fs: &dyn Fs, cache: &PackageCache) -> io::Result<()> {
        dat::write(fs, &cache.registry_file(), self)
    }

    /// Fetch the full listing from the package site and cache it.
    pub async fn fetch(
        fs: &dyn Fs,
        transport: &dyn Transport,
        site: &Site,
        cache: &PackageCache,
    ) -> Result<Self, RegistryProblem> {
        let url = site.all_packages();
        let bytes = transport.get(&url).await.map_err(RegistryProblem::Http)?;
        let listing: BTreeMap<PkgName, Vec<Version>> =
            json::from_slice(&bytes).map_err(|_| RegistryProblem::Data {
                url: url.to_string(),
            })?;

        let mut packages = BTreeMap::new();
        let mut count = 0;
        for (pkg, mut versions) in listing {
            versions.sort_unstable_by(|a, b| b.cmp(a));
            versions.dedup();
            let Some(newest) = versions.first().cloned() else {
                continue;
            };
            count += versions.len() as u64;
            packages.insert(
                pkg,
                KnownVersions {
                    newest,
                    previous: versions.split_off(1),
                },
            );
        }

        let registry = Self { count, packages };
        registry.write(fs, cache).ok();
        info!(packages = registry.packages.len(), versions = registry.count, "registry fetched");
        Ok(registry)
    }

    /// Pull versions published since this registry was last refreshed.
    ///
    /// The site returns `author/project@major.minor.patch` entries, newest
    /// first. An empty response means the registry is current.
    pub async fn update(
        mut self,
        fs: &dyn Fs,
        transport: &dyn Transport,
        site: &Site,
        cache: &PackageCache,
    ) -> Result<Self, RegistryProblem> {
        let url = site.all_packages_since(self.count);
        let bytes = transport.get(&url).await.map_err(RegistryProblem::Http)?;
        let entries: Vec<String> = json::from_slice(&bytes).map_err(|_| RegistryProblem::Data {
            url: url.to_string(),
        })?;
        if entries.is_empty() {
            return Ok(self);
        }

        // Oldest first, so repeated adds keep `newest` accurate.
        for entry in entries.iter().rev() {
            let parsed = entry.split_once('@').and_then(|(pkg, version)| {
                Some((pkg.parse::<PkgName>().ok()?, parse_version(version).ok()?))
            });
            let Some((pkg, version)) = parsed else {
                return Err(RegistryProblem::Data {
                    url: url.to_string(),
                });
            };
            add_known(&mut self.packages, pkg, version);
        }
        self.count += entries.len() as u64;
        self.write(fs, cache).ok();
        debug!(added = entries.len(), total = self.count, "registry updated");
        Ok(self)
    }

    /// Synthesize a registry from the packages already unpacked in the
    /// cache. `None` when nothing usable is there.
    #[must_use]
    pub fn scan(fs: &dyn Fs, cache: &PackageCache) -> Option<Self> {
        let packages_dir = cache.packages_dir();
        let mut packages: BTreeMap<PkgName, KnownVersions> = BTreeMap::new();
        let mut count = 0;

        for author in fs.list_dir(&packages_dir).ok()? {
            let author_dir = packages_dir.join(&author);
            if !fs.is_dir(&author_dir) {
                continue;
            }
            for project in fs.list_dir(&author_dir).ok().unwrap_or_default() {
                let Ok(pkg) = format!("{author}/{project}").parse::<PkgName>() else {
                    continue;
                };
                let project_dir = author_dir.join(&project);
                for entry in fs.list_dir(&project_dir).ok().unwrap_or_default() {
                    let Ok(version) = parse_version(&entry) else {
                        continue;
                    };
                    if !fs.is_dir(&project_dir.join(&entry)) {
                        continue;
                    }
                    count += 1;
                    add_known(&mut packages, pkg, version);
                }
            }
        }

        if packages.is_empty() {
            None
        } else {
            info!(packages = packages.len(), versions = count, "registry scanned from cache");
            Some(Self { count, packages })
        }
    }

    #[must_use]
    pub fn known_versions(&self, pkg: PkgName) -> Option<&KnownVersions> {
        self.packages.get(&pkg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use maestro_core::RealFs;
    use maestro_fetch::{ArchiveProblem, ArchiveTree};
    use pretty_assertions::assert_eq;
    use url::Url;

    #[derive(Debug, Default)]
    struct Canned {
        bodies: BTreeMap<String, Vec<u8>>,
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
            Err(ArchiveProblem::Request(HttpProblem::new(url, "no archive")))
        }
    }

    fn pkg(name: &str) -> PkgName {
        name.parse().unwrap()
    }

    #[test]
    fn known_versions_stay_ordered() {
        let mut known = KnownVersions::one(Version::new(1, 0, 0));
        known.add(Version::new(2, 0, 0));
        known.add(Version::new(1, 5, 0));
        known.add(Version::new(1, 5, 0));
        assert_eq!(known.newest, Version::new(2, 0, 0));
        assert_eq!(
            known.previous,
            vec![Version::new(1, 5, 0), Version::new(1, 0, 0)]
        );
        assert_eq!(known.total(), 3);
        let descending: Vec<_> = known.descending().cloned().collect();
        assert_eq!(
            descending,
            vec![
                Version::new(2, 0, 0),
                Version::new(1, 5, 0),
                Version::new(1, 0, 0)
            ]
        );
    }

    #[tokio::test]
    async fn fetch_builds_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs;
        let cache = PackageCache::new(dir.path());
        let site = Site::default();

        let mut transport = Canned::default();
        transport.bodies.insert(
            site.all_packages().to_string(),
            br#"{"elm/core":["1.0.0","1.0.5","1.0.2"],"elm/json":["1.1.3"]}"#.to_vec(),
        );

        let registry = Registry::fetch(&fs, &transport, &site, &cache)
            .await
            .unwrap();
        assert_eq!(registry.count, 4);
        let core = registry.known_versions(pkg("elm/core")).unwrap();
        assert_eq!(core.newest, Version::new(1, 0, 5));
        assert_eq!(
            core.previous,
            vec![Version::new(1, 0, 2), Version::new(1, 0, 0)]
        );

        // The fetch also wrote registry.dat.
        let cached = Registry::read(&fs, &cache).unwrap();
        assert_eq!(cached, registry);
    }

    #[tokio::test]
    async fn update_prepends_new_versions() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs;
        let cache = PackageCache::new(dir.path());
        let site = Site::default();

        let mut packages = BTreeMap::new();
        packages.insert(pkg("elm/core"), KnownVersions::one(Version::new(1, 0, 0)));
        let registry = Registry { count: 1, packages };

        let mut transport = Canned::default();
        transport.bodies.insert(
            site.all_packages_since(1).to_string(),
            br#"["elm/json@1.0.0","elm/core@1.0.1"]"#.to_vec(),
        );

        let updated = registry
            .update(&fs, &transport, &site, &cache)
            .await
            .unwrap();
        assert_eq!(updated.count, 3);
        assert_eq!(
            updated.known_versions(pkg("elm/core")).unwrap().newest,
            Version::new(1, 0, 1)
        );
        assert_eq!(
            updated.known_versions(pkg("elm/json")).unwrap().newest,
            Version::new(1, 0, 0)
        );
    }

    #[tokio::test]
    async fn update_with_no_news_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        let site = Site::default();

        let mut packages = BTreeMap::new();
        packages.insert(pkg("elm/core"), KnownVersions::one(Version::new(1, 0, 0)));
        let registry = Registry { count: 1, packages };

        let mut transport = Canned::default();
        transport
            .bodies
            .insert(site.all_packages_since(1).to_string(), b"[]".to_vec());

        let updated = registry
            .clone()
            .update(&RealFs, &transport, &site, &cache)
            .await
            .unwrap();
        assert_eq!(updated, registry);
    }

    #[test]
    fn scan_reads_unpacked_cache() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs;
        let cache = PackageCache::new(dir.path());
        let core = pkg("elm/core");
        fs.create_dir_all(&cache.src_dir(core, &Version::new(1, 0, 0)))
            .unwrap();
        fs.create_dir_all(&cache.src_dir(core, &Version::new(1, 0, 5)))
            .unwrap();

        let registry = Registry::scan(&fs, &cache).unwrap();
        assert_eq!(registry.count, 2);
        assert_eq!(
            registry.known_versions(core).unwrap().newest,
            Version::new(1, 0, 5)
        );
    }

    #[test]
    fn scan_of_empty_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(dir.path());
        assert_eq!(Registry::scan(&RealFs, &cache), None);
    }

    #[test]
    fn registry_dat_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs;
        let cache = PackageCache::new(dir.path());

        let mut packages = BTreeMap::new();
        packages.insert(pkg("elm/core"), KnownVersions::one(Version::new(1, 0, 0)));
        let registry = Registry { count: 1, packages };
        registry.write(&fs, &cache).unwrap();
        assert_eq!(Registry::read(&fs, &cache), Some(registry));
    }
}
