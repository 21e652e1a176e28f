//! Parallel dependency building for the Maestro details engine.
//!
//! - [`Cell`]: the write-once suspension primitive of the build
//! - [`with_scope`] / [`BackgroundWriter`]: crash-safe asynchronous persists
//! - [`verify_dependencies`]: per-package fanout with fingerprint-cached
//!   artifact reuse
//! - [`gather_interfaces`] / [`gather_objects`] / [`gather_foreigns`]:
//!   project-level aggregation

mod artifacts;
mod cell;
mod dep;
mod foreign;
mod gather;
mod writer;

pub use artifacts::{ArtifactCache, Artifacts, Fingerprint, fingerprint_of};
pub use cell::Cell;
pub use dep::{BadDep, BuildEnv, verify_dependencies};
pub use foreign::{Foreign, ForeignInterface, gather_foreign_interfaces};
pub use gather::{gather_foreigns, gather_interfaces, gather_objects};
pub use writer::{BackgroundWriter, WriteFailure, with_scope};
