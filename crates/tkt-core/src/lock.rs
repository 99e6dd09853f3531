//! Advisory locking for a shared `.tkt` directory
//!
//! `tkt` and `tkt-api` may run against the same directory at once. Writers
//! hold the exclusive lock across reload, persist and publish; readers hold
//! the shared lock while they check whether their copy is stale.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// How long to wait for another process before giving up
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Held advisory lock; released on drop
///
/// Backends with nothing outside the process hand out [`StoreLock::none`].
#[derive(Debug)]
pub struct StoreLock {
    file: Option<File>,
}

impl StoreLock {
    /// A lock that guards nothing
    pub fn none() -> Self {
        Self { file: None }
    }

    /// Take `mode` on the file at `path`, creating it if needed
    pub fn acquire(path: &Path, mode: LockMode, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            let busy = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file).is_err(),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file).is_err(),
            };
            if !busy {
                return Ok(Self { file: Some(file) });
            }

            if start.elapsed() >= timeout {
                return Err(Error::LockTimeout {
                    path: PathBuf::from(path),
                    waited: start.elapsed(),
                });
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = FileExt::unlock(file);
        }
    }
}
