//! Shared test support for the Maestro workspace: an in-memory filesystem,
//! a canned transport, a stub module compiler, and fixture builders.
//!
//! Everything here is deterministic, so engine tests can assert on exact
//! persisted bytes.

mod compiler;
mod fixtures;
mod memfs;
mod transport;

pub use compiler::StubCompiler;
pub use fixtures::{
    app_outline_json, install_package, install_project, pkg_outline_json, seed_registry,
};
pub use memfs::MemFs;
pub use transport::CannedTransport;
