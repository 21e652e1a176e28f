//! In-memory archive trees.
//!
//! Package archives arrive as zip files small enough to hold in memory, so
//! unpacking produces a flat list of sanitized (path, bytes) entries that is
//! written through the abstract filesystem. Publish archives wrap everything
//! in a single top-level directory, which is stripped.

use maestro_core::Fs;
use sha1::{Digest, Sha1};
use std::fmt::Write as _;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One extracted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// An unpacked archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveTree {
    pub files: Vec<ArchiveFile>,
}

/// The payload was not a readable zip archive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unreadable archive: {message}")]
pub struct BadArchive {
    pub message: String,
}

impl ArchiveTree {
    #[must_use]
    pub fn new(files: Vec<ArchiveFile>) -> Self {
        Self { files }
    }

    /// Unpack a zip archive, sanitizing entry paths and stripping the single
    /// top-level directory publish archives carry.
    pub fn from_zip(bytes: &[u8]) -> Result<Self, BadArchive> {
        let bad = |message: String| BadArchive { message };
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| bad(e.to_string()))?;
        let mut files = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(|e| bad(e.to_string()))?;
            if entry.is_dir() {
                continue;
            }
            let Some(path) = sanitize(entry.name()) else {
                continue;
            };
            let mut contents = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            entry
                .read_to_end(&mut contents)
                .map_err(|e| bad(e.to_string()))?;
            files.push(ArchiveFile {
                path,
                bytes: contents,
            });
        }
        Ok(Self { files })
    }

    /// Write every file under `dest`.
    pub fn write_under(&self, fs: &dyn Fs, dest: &Path) -> io::Result<()> {
        for file in &self.files {
            fs.write_binary(&dest.join(&file.path), &file.bytes)?;
        }
        Ok(())
    }
}

/// Drop the root directory, reject traversal components, normalize
/// separators. `None` means the entry has nothing left to write.
fn sanitize(name: &str) -> Option<PathBuf> {
    let path: PathBuf = name
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .skip(1)
        .collect();
    (!path.as_os_str().is_empty()).then_some(path)
}

/// Lowercase SHA-1 hex digest.
#[must_use]
pub fn sha1_hex(bytes: &[u8]) -> String {
    let digest = Sha1::digest(bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn unpacks_and_strips_root() {
        let bytes = zip_of(&[
            ("elm-core-abc123/elm.json", b"{}"),
            ("elm-core-abc123/src/Basics.elm", b"module Basics exposing (..)"),
        ]);
        let tree = ArchiveTree::from_zip(&bytes).unwrap();
        let paths: Vec<_> = tree.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("elm.json"), PathBuf::from("src/Basics.elm")]
        );
    }

    #[test]
    fn rejects_traversal_segments() {
        assert_eq!(sanitize("root/../../etc/passwd"), Some(PathBuf::from("etc/passwd")));
        assert_eq!(sanitize("root/./src/A.elm"), Some(PathBuf::from("src/A.elm")));
        assert_eq!(sanitize("root"), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(ArchiveTree::from_zip(b"definitely not a zip").is_err());
    }

    #[test]
    fn writes_through_fs() {
        let dir = tempfile::tempdir().unwrap();
        let fs = maestro_core::RealFs;
        let tree = ArchiveTree::new(vec![ArchiveFile {
            path: PathBuf::from("src/Main.elm"),
            bytes: b"module Main exposing (..)".to_vec(),
        }]);
        tree.write_under(&fs, dir.path()).unwrap();
        assert_eq!(
            fs.read_binary(&dir.path().join("src/Main.elm")).unwrap(),
            b"module Main exposing (..)"
        );
    }

    #[test]
    fn sha1_matches_known_vector() {
        assert_eq!(
            sha1_hex(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }
}
