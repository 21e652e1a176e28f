//! Aggregating per-package artifacts into project-level maps.
//!
//! Direct dependencies contribute their interfaces as-is; indirect (and
//! test-only) dependencies are privatized so the project's own modules
//! cannot import from them. The foreigns map records, per publicly exported
//! module name, every direct dependency that exports it; ambiguity is
//! tolerated here and only becomes an error when a local import resolves
//! the name.

use crate::artifacts::Artifacts;
use crate::foreign::Foreign;
use maestro_core::{Canonical, GlobalGraph, Interfaces, Name, PkgName};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// The project-level interface map over every dependency package.
#[must_use]
pub fn gather_interfaces(
    artifacts: &BTreeMap<PkgName, Arc<Artifacts>>,
    direct: &BTreeSet<PkgName>,
) -> Interfaces {
    let mut interfaces = Interfaces::new();
    for (pkg, built) in artifacts {
        let is_direct = direct.contains(pkg);
        for (module, dependency_interface) in &built.interfaces {
            let visible = if is_direct {
                dependency_interface.clone()
            } else {
                dependency_interface.clone().privatize()
            };
            interfaces.insert(Canonical::new(*pkg, *module), visible);
        }
    }
    interfaces
}

/// The union of every package's object graph.
#[must_use]
pub fn gather_objects(artifacts: &BTreeMap<PkgName, Arc<Artifacts>>) -> GlobalGraph {
    let mut objects = GlobalGraph::new();
    for built in artifacts.values() {
        objects.add_global_graph(&built.objects);
    }
    objects
}

/// Which direct dependencies export each public module name.
#[must_use]
pub fn gather_foreigns(
    artifacts: &BTreeMap<PkgName, Arc<Artifacts>>,
    direct: &BTreeSet<PkgName>,
) -> BTreeMap<Name, Foreign> {
    let mut exporters: BTreeMap<Name, Vec<PkgName>> = BTreeMap::new();
    for (pkg, built) in artifacts {
        if !direct.contains(pkg) {
            continue;
        }
        for (module, dependency_interface) in &built.interfaces {
            if dependency_interface.as_public().is_some() {
                exporters.entry(*module).or_default().push(*pkg);
            }
        }
    }
    exporters
        .into_iter()
        .map(|(module, mut pkgs)| {
            let primary = pkgs.remove(0);
            (
                module,
                Foreign {
                    primary,
                    rest: pkgs,
                },
            )
        })
        .collect()
}
