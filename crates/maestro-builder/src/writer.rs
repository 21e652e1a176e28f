//! The background writer.
//!
//! Persisting `d.dat`, `i.dat`, and `o.dat` should not serialize the tail of
//! a build, so writes are enqueued on blocking tasks and collected when the
//! scope closes. Writes may finish in any order; the scope does not end
//! until every one has succeeded, and the first failure is reported.

use maestro_core::dat;
use maestro_core::fs::Fs;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::trace;

/// A background write failed; the persisted state is incomplete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("could not write {path}: {message}")]
pub struct WriteFailure {
    pub path: PathBuf,
    pub message: String,
}

/// A scope that owns in-flight writes.
#[derive(Debug)]
pub struct BackgroundWriter {
    fs: Arc<dyn Fs>,
    pending: Mutex<Vec<JoinHandle<Result<(), WriteFailure>>>>,
}

impl BackgroundWriter {
    fn new(fs: Arc<dyn Fs>) -> Self {
        Self {
            fs,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue an enveloped binary write of `value` to `path`.
    ///
    /// Encoding happens now (values are snapshots); the disk write happens
    /// on a blocking task before the scope closes.
    pub fn write_dat<T: Serialize>(&self, path: PathBuf, value: &T) {
        let encoded = dat::encode(value);
        let fs = Arc::clone(&self.fs);
        let handle = tokio::task::spawn_blocking(move || {
            trace!(path = %path.display(), "background write");
            let failed = |message: String| WriteFailure {
                path: path.clone(),
                message,
            };
            let bytes = encoded.map_err(|e| failed(e.to_string()))?;
            fs.write_binary(&path, &bytes)
                .map_err(|e| failed(e.to_string()))
        });
        self.pending.lock().push(handle);
    }

    async fn finish(self) -> Result<(), WriteFailure> {
        let pending = self.pending.into_inner();
        let mut first_failure = None;
        for handle in pending {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    if join_error.is_panic() {
                        std::panic::resume_unwind(join_error.into_panic());
                    }
                    continue;
                }
            };
            if let Err(failure) = result
                && first_failure.is_none()
            {
                first_failure = Some(failure);
            }
        }
        match first_failure {
            None => Ok(()),
            Some(failure) => Err(failure),
        }
    }
}

/// Run `f` with a writer scope; every enqueued write completes (or the
/// first failure is returned) before the value is handed back.
pub async fn with_scope<T, F>(fs: Arc<dyn Fs>, f: F) -> Result<T, WriteFailure>
where
    F: AsyncFnOnce(&BackgroundWriter) -> T,
{
    let writer = BackgroundWriter::new(fs);
    let value = f(&writer).await;
    writer.finish().await?;
    Ok(value)
}
