//! An in-memory filesystem for tests.

use dashmap::{DashMap, DashSet};
use maestro_core::fs::{Fs, LockGuard, ModTime};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory [`Fs`] implementation.
///
/// Every write stamps a fresh, strictly increasing mtime; tests can pin a
/// specific mtime with [`MemFs::set_mtime`] to model "touched but not
/// changed" and "unchanged since last run" situations.
#[derive(Debug, Default)]
pub struct MemFs {
    files: DashMap<PathBuf, Vec<u8>>,
    mtimes: DashMap<PathBuf, ModTime>,
    dirs: DashSet<PathBuf>,
    clock: AtomicU64,
}

impl MemFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a UTF-8 file.
    pub fn write_str(&self, path: impl Into<PathBuf>, contents: &str) {
        let path = path.into();
        self.write_binary(&path, contents.as_bytes())
            .expect("memfs write cannot fail");
    }

    /// Pin the mtime of an existing file.
    pub fn set_mtime(&self, path: impl Into<PathBuf>, mtime: ModTime) {
        self.mtimes.insert(path.into(), mtime);
    }

    fn tick(&self) -> ModTime {
        ModTime::from_nanos(u128::from(self.clock.fetch_add(1, Ordering::SeqCst)) + 1)
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
    }
}

#[derive(Debug)]
struct NoopGuard;

impl LockGuard for NoopGuard {}

impl Fs for MemFs {
    fn read_utf8(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read_binary(path)?;
        String::from_utf8(bytes).map_err(io::Error::other)
    }

    fn read_binary(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|entry| entry.clone())
            .ok_or_else(|| Self::not_found(path))
    }

    fn write_binary(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.files.insert(path.to_path_buf(), bytes.to_vec());
        self.mtimes.insert(path.to_path_buf(), self.tick());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.is_dir(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        if self.dirs.contains(path) {
            return true;
        }
        self.files
            .iter()
            .any(|entry| entry.key().starts_with(path) && entry.key() != path)
            || self
                .dirs
                .iter()
                .any(|dir| dir.starts_with(path) && *dir != path)
    }

    fn mtime(&self, path: &Path) -> io::Result<ModTime> {
        self.mtimes
            .get(path)
            .map(|entry| *entry)
            .ok_or_else(|| Self::not_found(path))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut removed = self.files.remove(path).is_some();
        self.mtimes.remove(path);
        let under: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|entry| entry.key().starts_with(path))
            .map(|entry| entry.key().clone())
            .collect();
        for file in under {
            self.files.remove(&file);
            self.mtimes.remove(&file);
            removed = true;
        }
        let dirs: Vec<PathBuf> = self
            .dirs
            .iter()
            .filter(|dir| dir.starts_with(path))
            .map(|dir| dir.clone())
            .collect();
        for dir in dirs {
            self.dirs.remove(&dir);
            removed = true;
        }
        if removed {
            Ok(())
        } else {
            Err(Self::not_found(path))
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        if !self.is_dir(path) {
            return Err(Self::not_found(path));
        }
        let mut names: Vec<String> = self
            .files
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.dirs.iter().map(|dir| dir.clone()))
            .filter_map(|child| {
                let rest = child.strip_prefix(path).ok()?;
                let first = rest.components().next()?;
                Some(first.as_os_str().to_string_lossy().into_owned())
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn lock_exclusive(&self, _path: &Path) -> io::Result<Box<dyn LockGuard>> {
        Ok(Box::new(NoopGuard))
    }
}
