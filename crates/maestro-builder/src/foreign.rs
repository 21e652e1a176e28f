//! Foreign module namespaces.
//!
//! While building one package, every module its direct dependencies expose
//! publicly is *foreign*. A name exposed by exactly one dependency resolves
//! to that interface; a name exposed by several is ambiguous, and importing
//! it is an error.

use crate::artifacts::Artifacts;
use maestro_core::{Interface, Name, PkgName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What one foreign module name resolves to.
#[derive(Debug, Clone)]
pub enum ForeignInterface {
    Specific(Arc<Interface>),
    Ambiguous,
}

/// Resolve the foreign namespace from the direct dependencies' artifacts.
#[must_use]
pub fn gather_foreign_interfaces(
    direct: &BTreeMap<PkgName, Arc<Artifacts>>,
) -> BTreeMap<Name, ForeignInterface> {
    let mut foreigns = BTreeMap::new();
    for artifacts in direct.values() {
        for (module, dependency_interface) in &artifacts.interfaces {
            let Some(interface) = dependency_interface.as_public() else {
                continue;
            };
            foreigns
                .entry(*module)
                .and_modify(|entry| *entry = ForeignInterface::Ambiguous)
                .or_insert_with(|| ForeignInterface::Specific(Arc::new(interface.clone())));
        }
    }
    foreigns
}

/// The packages that export one module name, as recorded in the top-level
/// details. Ambiguous iff `rest` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Foreign {
    pub primary: PkgName,
    pub rest: Vec<PkgName>,
}

impl Foreign {
    #[must_use]
    pub fn one(primary: PkgName) -> Self {
        Self {
            primary,
            rest: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        !self.rest.is_empty()
    }
}
