//! Advisory cross-process lock over a sidecar file.
//!
//! Acquisition takes a process-local mutex first, then an exclusive
//! `flock`-style lock on the sidecar file, retrying a bounded number of
//! times. The returned [`FileLockGuard`] releases both on drop, in reverse
//! order. The sidecar file is never removed.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use fs2::FileExt;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub const LOCK_ATTEMPTS: u32 = 10;
pub const LOCK_RETRY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("couldn't open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("couldn't lock {path}: {source}")]
    Lock { path: PathBuf, source: io::Error },
    #[error("couldn't lock {path} after {attempts} attempts")]
    Exhausted { path: PathBuf, attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: LOCK_ATTEMPTS, pause: LOCK_RETRY_PAUSE }
    }
}

#[derive(Debug)]
pub struct FileLock {
    local: Mutex<()>,
    path: PathBuf,
    policy: RetryPolicy,
}

/// Held while a mutating call owns the data file.
#[must_use]
pub struct FileLockGuard<'a> {
    file: File,
    _local: MutexGuard<'a, ()>,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_policy(path, RetryPolicy::default())
    }

    pub(crate) fn with_policy(path: impl Into<PathBuf>, policy: RetryPolicy) -> Self {
        Self { local: Mutex::new(()), path: path.into(), policy }
    }

    pub async fn acquire(&self) -> Result<FileLockGuard<'_>, LockError> {
        let local = self.local.lock().await;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| LockError::Open { path: self.path.clone(), source })?;

        for attempt in 1..=self.policy.attempts {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(FileLockGuard { file, _local: local }),
                Err(e) if is_contended(&e) => {
                    debug!(path = %self.path.display(), attempt, "lock file busy");
                }
                Err(source) => return Err(LockError::Lock { path: self.path.clone(), source }),
            }
            if attempt < self.policy.attempts {
                tokio::time::sleep(self.policy.pause).await;
            }
        }

        warn!(path = %self.path.display(), attempts = self.policy.attempts, "giving up on lock file");
        Err(LockError::Exhausted { path: self.path.clone(), attempts: self.policy.attempts })
    }
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "couldn't unlock lock file");
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
