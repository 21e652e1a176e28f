//! Per-package build products and their on-disk cache.

use maestro_core::{Constraint, DependencyInterface, GlobalGraph, Name, PkgName, Version, json};
use maestro_core::fs::Fs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

/// The exact version picked for every direct dependency of a package during
/// one solve. Artifacts are reusable only under a matching fingerprint.
pub type Fingerprint = BTreeMap<PkgName, Version>;

/// This package's fingerprint under `solution`: the solved versions of its
/// declared direct dependencies.
#[must_use]
pub fn fingerprint_of(
    solution_versions: &BTreeMap<PkgName, Version>,
    deps: &BTreeMap<PkgName, Constraint>,
) -> Fingerprint {
    deps.keys()
        .filter_map(|dep| solution_versions.get(dep).map(|v| (*dep, v.clone())))
        .collect()
}

/// The full build product of one dependency package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub interfaces: BTreeMap<Name, DependencyInterface>,
    pub objects: GlobalGraph,
}

/// What `artifacts.json` holds: the artifacts plus every fingerprint they
/// were valid under. The set only grows; each successful build under a new
/// fingerprint adds to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCache {
    pub fingerprints: BTreeSet<Fingerprint>,
    pub artifacts: Artifacts,
}

impl ArtifactCache {
    /// Read a cache file; `None` for missing or unrecognizable content.
    #[must_use]
    pub fn read(fs: &dyn Fs, path: &Path) -> Option<Self> {
        let bytes = fs.read_binary(path).ok()?;
        json::from_slice(&bytes).ok()
    }

    pub fn write(&self, fs: &dyn Fs, path: &Path) -> io::Result<()> {
        let bytes = json::to_vec(self).map_err(io::Error::other)?;
        fs.write_binary(path, &bytes)
    }
}
