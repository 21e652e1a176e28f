//! Package cache layout.
//!
//! All shared package state lives under one home directory:
//!
//! ```text
//! <home>/registry.dat
//! <home>/packages/.lock
//! <home>/packages/<author>/<project>/<version>/elm.json
//! <home>/packages/<author>/<project>/<version>/src/**
//! <home>/packages/<author>/<project>/<version>/artifacts.json
//! <home>/packages/<author>/<project>/<version>/docs.json
//! ```

use crate::pkg::PkgName;
use semver::Version;
use std::path::{Path, PathBuf};

/// Path helpers for the shared package cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCache {
    home: PathBuf,
}

impl PackageCache {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    #[must_use]
    pub fn packages_dir(&self) -> PathBuf {
        self.home.join("packages")
    }

    #[must_use]
    pub fn registry_file(&self) -> PathBuf {
        self.home.join("registry.dat")
    }

    /// The advisory lock guarding the whole package cache during a verify.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.packages_dir().join(".lock")
    }

    #[must_use]
    pub fn package_dir(&self, pkg: PkgName, version: &Version) -> PathBuf {
        self.packages_dir()
            .join(pkg.author.as_str())
            .join(pkg.project.as_str())
            .join(version.to_string())
    }

    #[must_use]
    pub fn src_dir(&self, pkg: PkgName, version: &Version) -> PathBuf {
        self.package_dir(pkg, version).join("src")
    }

    #[must_use]
    pub fn outline_file(&self, pkg: PkgName, version: &Version) -> PathBuf {
        self.package_dir(pkg, version).join("elm.json")
    }

    #[must_use]
    pub fn artifacts_file(&self, pkg: PkgName, version: &Version) -> PathBuf {
        self.package_dir(pkg, version).join("artifacts.json")
    }

    #[must_use]
    pub fn docs_file(&self, pkg: PkgName, version: &Version) -> PathBuf {
        self.package_dir(pkg, version).join("docs.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn layout() {
        let cache = PackageCache::new("/home/user/.elm/0.19.1");
        let pkg: PkgName = "elm/core".parse().unwrap();
        let version = Version::new(1, 0, 5);
        assert_eq!(
            cache.src_dir(pkg, &version),
            PathBuf::from("/home/user/.elm/0.19.1/packages/elm/core/1.0.5/src")
        );
        assert_eq!(
            cache.registry_file(),
            PathBuf::from("/home/user/.elm/0.19.1/registry.dat")
        );
        assert_eq!(
            cache.lock_file(),
            PathBuf::from("/home/user/.elm/0.19.1/packages/.lock")
        );
    }
}
