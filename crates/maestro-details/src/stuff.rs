//! Project-local persisted state layout.
//!
//! ```text
//! <root>/elm-stuff/<compiler-version>/d.dat   Details
//! <root>/elm-stuff/<compiler-version>/i.dat   Interfaces
//! <root>/elm-stuff/<compiler-version>/o.dat   GlobalGraph
//! ```

use maestro_core::compiler_version;
use std::path::{Path, PathBuf};

#[must_use]
pub fn stuff_dir(root: &Path) -> PathBuf {
    root.join("elm-stuff").join(compiler_version().to_string())
}

#[must_use]
pub fn details_file(root: &Path) -> PathBuf {
    stuff_dir(root).join("d.dat")
}

#[must_use]
pub fn interfaces_file(root: &Path) -> PathBuf {
    stuff_dir(root).join("i.dat")
}

#[must_use]
pub fn objects_file(root: &Path) -> PathBuf {
    stuff_dir(root).join("o.dat")
}
