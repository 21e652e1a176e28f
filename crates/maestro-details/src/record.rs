//! The persisted `Details` record.
//!
//! `Details` is the top-level product of a verify run: the validated
//! outline, the per-local-module bookkeeping, the foreign-module map, and
//! (in memory only) the freshly built interfaces and object graph. The
//! in-memory extras are never persisted; a decoded record always reads as
//! `Cached` and the heavyweight artifacts are re-read on demand.

use maestro_builder::Foreign;
use maestro_core::{BuildId, GlobalGraph, Interfaces, ModTime, Name, PkgName, Version};
use maestro_core::fs::Fs;
use maestro_core::dat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::stuff;

/// Persisted metadata for one in-project source module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    pub path: PathBuf,
    pub time: ModTime,
    /// Raw names of the module's direct imports.
    pub deps: Vec<Name>,
    pub has_main: bool,
    /// The build in which this module's interface last changed.
    pub last_change: BuildId,
    /// The build in which this module was last compiled.
    pub last_compile: BuildId,
}

impl Local {
    /// Whether the module must be recompiled: its file time moved, or some
    /// transitive import changed after this module last compiled.
    pub fn needs_recompile<'a>(
        &self,
        current_time: ModTime,
        transitive_imports: impl IntoIterator<Item = &'a Local>,
    ) -> bool {
        self.time != current_time
            || transitive_imports
                .into_iter()
                .any(|import| import.last_change > self.last_compile)
    }
}

/// The typed, validated form of the project outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidOutline {
    App {
        source_dirs: Vec<PathBuf>,
    },
    Pkg {
        name: PkgName,
        exposed: Vec<Name>,
        /// Exact solved versions, retained for documentation tooling.
        exact_deps: BTreeMap<PkgName, Version>,
    },
}

/// Build products attached to a `Details` value.
///
/// `Fresh` exists only right after a generate; it never survives a
/// round-trip through disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Extras {
    #[default]
    Cached,
    Fresh {
        interfaces: Interfaces,
        objects: GlobalGraph,
    },
}

/// The top-level persisted project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Details {
    pub outline_time: ModTime,
    pub outline: ValidOutline,
    pub build_id: BuildId,
    pub locals: BTreeMap<Name, Local>,
    pub foreigns: BTreeMap<Name, Foreign>,
    #[serde(skip, default)]
    pub extras: Extras,
}

impl Details {
    /// Read the persisted record for `root`; `None` for missing or
    /// unrecognizable files.
    #[must_use]
    pub fn read(fs: &dyn Fs, root: &Path) -> Option<Self> {
        dat::read(fs, &stuff::details_file(root))
    }

    /// Persist this record for `root`. Used by the module compiler
    /// collaborator after it refreshes `locals`.
    pub fn write(&self, fs: &dyn Fs, root: &Path) -> io::Result<()> {
        dat::write(fs, &stuff::details_file(root), self)
    }
}

/// Re-read the persisted interfaces for a `Details` whose extras are
/// [`Extras::Cached`].
#[must_use]
pub fn load_interfaces(fs: &dyn Fs, root: &Path) -> Option<Interfaces> {
    dat::read(fs, &stuff::interfaces_file(root))
}

/// Re-read the persisted object graph for a `Details` whose extras are
/// [`Extras::Cached`].
#[must_use]
pub fn load_objects(fs: &dyn Fs, root: &Path) -> Option<GlobalGraph> {
    dat::read(fs, &stuff::objects_file(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_test_utils::MemFs;
    use pretty_assertions::assert_eq;

    fn local(time: u128, last_change: BuildId, last_compile: BuildId) -> Local {
        Local {
            path: PathBuf::from("src/Main.elm"),
            time: ModTime::from_nanos(time),
            deps: vec![Name::from_str("Helpers")],
            has_main: true,
            last_change,
            last_compile,
        }
    }

    #[test]
    fn recompile_when_file_time_moves() {
        let module = local(10, 1, 1);
        assert!(!module.needs_recompile(ModTime::from_nanos(10), []));
        assert!(module.needs_recompile(ModTime::from_nanos(11), []));
    }

    #[test]
    fn recompile_when_an_import_changed_later() {
        let module = local(10, 1, 3);
        let stale_import = local(10, 4, 4);
        let fresh_import = local(10, 2, 2);
        assert!(module.needs_recompile(ModTime::from_nanos(10), [&stale_import]));
        assert!(!module.needs_recompile(ModTime::from_nanos(10), [&fresh_import]));
    }

    #[test]
    fn fresh_extras_do_not_survive_persistence() {
        let fs = MemFs::new();
        let root = Path::new("/project");
        let details = Details {
            outline_time: ModTime::from_nanos(42),
            outline: ValidOutline::App {
                source_dirs: vec![PathBuf::from("src")],
            },
            build_id: 0,
            locals: BTreeMap::new(),
            foreigns: BTreeMap::new(),
            extras: Extras::Fresh {
                interfaces: Interfaces::new(),
                objects: GlobalGraph::new(),
            },
        };
        details.write(&fs, root).unwrap();
        let back = Details::read(&fs, root).unwrap();
        assert_eq!(back.extras, Extras::Cached);
        assert_eq!(back.outline, details.outline);
        assert_eq!(back.outline_time, details.outline_time);
    }

    #[test]
    fn details_encoding_is_deterministic() {
        let details = Details {
            outline_time: ModTime::from_nanos(7),
            outline: ValidOutline::Pkg {
                name: "elm/html".parse().unwrap(),
                exposed: vec![Name::from_str("Html")],
                exact_deps: BTreeMap::new(),
            },
            build_id: 3,
            locals: BTreeMap::new(),
            foreigns: BTreeMap::new(),
            extras: Extras::Cached,
        };
        assert_eq!(
            dat::encode(&details).unwrap(),
            dat::encode(&details.clone()).unwrap()
        );
    }
}
