//! The filesystem collaborator interface.
//!
//! Everything the engine touches on disk goes through [`Fs`], so tests can
//! run against an in-memory tree and the registry lock can be faked. The
//! production implementation is [`RealFs`].

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// A filesystem modification timestamp.
///
/// Compared by equality only: the engine never asks whether one time is
/// *later* than another, only whether a file changed since it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModTime(u128);

impl ModTime {
    #[must_use]
    pub fn from_nanos(nanos: u128) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub fn as_nanos(self) -> u128 {
        self.0
    }
}

impl From<SystemTime> for ModTime {
    fn from(time: SystemTime) -> Self {
        let nanos = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self(nanos)
    }
}

/// An exclusive advisory lock; dropping the guard releases it.
pub trait LockGuard: Send + fmt::Debug {}

/// Abstract filesystem access.
///
/// `write_binary` and `lock_exclusive` create missing parent directories.
pub trait Fs: Send + Sync + fmt::Debug {
    fn read_utf8(&self, path: &Path) -> io::Result<String>;
    fn read_binary(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_binary(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn mtime(&self, path: &Path) -> io::Result<ModTime>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Names of the entries directly under `path`.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;
    /// Take an exclusive advisory lock on `path`, blocking until available.
    fn lock_exclusive(&self, path: &Path) -> io::Result<Box<dyn LockGuard>>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

#[derive(Debug)]
struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl LockGuard for FileLock {}

fn create_parents(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl Fs for RealFs {
    fn read_utf8(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn read_binary(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_binary(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        create_parents(path)?;
        fs::write(path, bytes)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn mtime(&self, path: &Path) -> io::Result<ModTime> {
        Ok(fs::metadata(path)?.modified()?.into())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn lock_exclusive(&self, path: &Path) -> io::Result<Box<dyn LockGuard>> {
        create_parents(path)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Box::new(FileLock { file }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs;
        let path = dir.path().join("nested/dir/file.bin");

        assert!(!fs.exists(&path));
        fs.write_binary(&path, b"payload").unwrap();
        assert!(fs.exists(&path));
        assert_eq!(fs.read_binary(&path).unwrap(), b"payload");
        assert!(fs.mtime(&path).is_ok());

        let names = fs.list_dir(&dir.path().join("nested")).unwrap();
        assert_eq!(names, vec!["dir".to_string()]);

        fs.remove(&path).unwrap();
        assert!(!fs.exists(&path));
    }

    #[test]
    fn lock_can_be_taken_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFs;
        let lock_path = dir.path().join("cache/.lock");
        let guard = fs.lock_exclusive(&lock_path).unwrap();
        drop(guard);
        // Re-lockable after release.
        let _again = fs.lock_exclusive(&lock_path).unwrap();
    }
}
