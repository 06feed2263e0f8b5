//! Job lock management
//!
//! Provides exclusive locking so two processes never drive the same
//! checkpoint (same source URL and destination) at once.
//!
//! The lock is an fs2 advisory lock on a per-job file. The OS releases it
//! when the holder exits, so a leftover file from a crashed run never blocks
//! the next one. The file itself is never unlinked: removing it while another
//! process waits on the same inode would let a third process lock a fresh one.

use crate::core::error::{FetchError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Acquire the exclusive lock at `lock_path`.
/// Returns a guard that releases the lock when dropped.
///
/// Fails with [`FetchError::AlreadyRunning`] when another holder has it, and
/// with [`FetchError::Checkpoint`] when the lock file cannot be created.
pub fn acquire_job_lock(lock_path: &Path) -> Result<JobLock> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| lock_setup_error(parent, e))?;
    }

    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|e| lock_setup_error(lock_path, e))?;

    if lock_file.try_lock_exclusive().is_err() {
        return Err(FetchError::AlreadyRunning(lock_path.to_path_buf()));
    }

    Ok(JobLock {
        file: lock_file,
        path: lock_path.to_path_buf(),
    })
}

fn lock_setup_error(path: &Path, e: std::io::Error) -> FetchError {
    FetchError::Checkpoint(format!(
        "failed to create lock file {}: {}",
        path.display(),
        e
    ))
}

/// RAII guard for a job lock. Dropping it releases the lock; the file stays.
#[derive(Debug)]
pub struct JobLock {
    file: File,
    path: PathBuf,
}

impl JobLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
