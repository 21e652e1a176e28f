//! Package site access for the Maestro details engine.
//!
//! - [`Transport`]: the HTTP collaborator interface and its reqwest
//!   implementation
//! - [`Site`]: registry route building
//! - [`ArchiveTree`]: in-memory unpacked archives
//! - [`download_package`]: endpoint fetch, hash verification, cache unpack

mod archive;
mod download;
mod site;
mod transport;

pub use archive::{ArchiveFile, ArchiveTree, BadArchive, sha1_hex};
pub use download::{DownloadProblem, download_package};
pub use site::Site;
pub use transport::{ArchiveProblem, HttpProblem, HttpTransport, Transport};
