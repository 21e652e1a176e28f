//! Write-once cells.
//!
//! A [`Cell`] is the single suspension primitive of the build: written at
//! most once, read many times, and every reader blocks until the write
//! lands. Clones share the same slot.

use parking_lot::RwLock;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug)]
struct Inner<T> {
    slot: RwLock<Option<Arc<T>>>,
    notify: Notify,
}

/// A single-assignment, multi-reader asynchronous cell.
#[derive(Debug)]
pub struct Cell<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Cell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Cell<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: RwLock::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Fill the cell, waking every waiting reader. Returns `false` when the
    /// cell was already filled (the value is dropped).
    pub fn put(&self, value: T) -> bool {
        {
            let mut slot = self.inner.slot.write();
            if slot.is_some() {
                return false;
            }
            *slot = Some(Arc::new(value));
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// The value, if already written.
    #[must_use]
    pub fn try_read(&self) -> Option<Arc<T>> {
        self.inner.slot.read().clone()
    }

    /// Wait for the value.
    pub async fn read(&self) -> Arc<T> {
        // notify_waiters only wakes registered waiters, so the notified
        // future must be enabled before the final slot check.
        let mut notified = pin!(self.inner.notify.notified());
        loop {
            if let Some(value) = self.try_read() {
                return value;
            }
            notified.as_mut().enable();
            if let Some(value) = self.try_read() {
                return value;
            }
            notified.as_mut().await;
            notified.set(self.inner.notify.notified());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn read_after_write() {
        let cell = Cell::new();
        assert!(cell.put(7u32));
        assert_eq!(*cell.read().await, 7);
    }

    #[tokio::test]
    async fn second_write_is_rejected() {
        let cell = Cell::new();
        assert!(cell.put(1u32));
        assert!(!cell.put(2u32));
        assert_eq!(*cell.read().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_block_until_written() {
        let cell: Cell<u32> = Cell::new();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                tokio::spawn(async move { *cell.read().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cell.try_read().is_none());
        cell.put(42);

        for reader in readers {
            assert_eq!(reader.await.unwrap(), 42);
        }
    }

    #[tokio::test]
    async fn try_read_is_nonblocking() {
        let cell: Cell<u32> = Cell::new();
        assert!(cell.try_read().is_none());
        cell.put(5);
        assert_eq!(cell.try_read().map(|v| *v), Some(5));
    }
}
