//! Checkpoint store
//!
//! One JSON record per (source URL, absolute destination) pair in a single
//! directory, named by the pair's fingerprint. Writes go through a temp file
//! in the same directory and a rename, so a crash leaves either the old or the
//! new record on disk, never a torn one.

mod record;

pub use record::{DownloadCheckpoint, FailedEntry, SCHEMA_VERSION};

use crate::core::error::{FetchError, Result};
use crate::core::output;
use crate::helpers::fs_utils::absolute_normalized;
use crate::helpers::hash::{fingerprint, verify_file_hash};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Listing row for one persisted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSummary {
    pub id: String,
    pub source_url: String,
    pub destination: PathBuf,
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    pub last_updated: u64,
}

impl From<&DownloadCheckpoint> for CheckpointSummary {
    fn from(cp: &DownloadCheckpoint) -> Self {
        Self {
            id: cp.id.clone(),
            source_url: cp.source_url.clone(),
            destination: cp.destination.clone(),
            completed: cp.completed.len(),
            total: cp.total_files,
            failed: cp.failed.len(),
            last_updated: cp.last_updated,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identity of a job. The destination is made absolute first, so `out`
    /// and `./out` run from the same directory are the same job.
    pub fn fingerprint_for(url: &str, destination: &Path) -> Result<String> {
        let dest = absolute_normalized(destination)?;
        Ok(fingerprint(&[url, &dest.to_string_lossy()]))
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn lock_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", id))
    }

    /// Load the record for this job. An unreadable record is reported and
    /// treated as absent so the job starts over.
    pub fn load(&self, url: &str, destination: &Path) -> Result<Option<DownloadCheckpoint>> {
        let id = Self::fingerprint_for(url, destination)?;
        let path = self.record_path(&id);
        if !path.exists() {
            return Ok(None);
        }
        match read_record(&path) {
            Ok(cp) => Ok(Some(cp)),
            Err(e) => {
                output::warning(&format!("ignoring unreadable checkpoint: {}", e));
                Ok(None)
            }
        }
    }

    /// Start a fresh record and persist it.
    pub fn create_new(
        &self,
        url: &str,
        destination: &Path,
        total_files: usize,
    ) -> Result<DownloadCheckpoint> {
        let id = Self::fingerprint_for(url, destination)?;
        let mut cp = DownloadCheckpoint::new(
            id,
            url.to_owned(),
            absolute_normalized(destination)?,
            total_files,
        );
        self.save(&mut cp)?;
        Ok(cp)
    }

    /// Atomically write `checkpoint`, bumping its `last_updated`.
    pub fn save(&self, checkpoint: &mut DownloadCheckpoint) -> Result<()> {
        checkpoint.touch();
        std::fs::create_dir_all(&self.dir).map_err(|e| store_error("create", &self.dir, e))?;

        let json = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| FetchError::Checkpoint(format!("serialize failed: {}", e)))?;

        let target = self.record_path(&checkpoint.id);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| store_error("create temp file in", &self.dir, e))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| store_error("write", tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| store_error("replace", &target, e.error))?;
        Ok(())
    }

    /// Delete the record for this job, if any.
    pub fn cleanup(&self, url: &str, destination: &Path) -> Result<()> {
        let id = Self::fingerprint_for(url, destination)?;
        let path = self.record_path(&id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error("remove", &path, e)),
        }
    }

    /// True when `path` exists and hashes to `expected_hash`.
    pub fn verify_integrity(path: &Path, expected_hash: &str) -> bool {
        verify_file_hash(path, expected_hash).is_ok()
    }

    /// Every readable record, most recently updated first. Unreadable records
    /// are skipped with a warning.
    pub fn list(&self) -> Result<Vec<CheckpointSummary>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(store_error("read", &self.dir, e)),
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_record(&path) {
                Ok(cp) => summaries.push(CheckpointSummary::from(&cp)),
                Err(e) => output::warning(&format!("skipping checkpoint: {}", e)),
            }
        }
        summaries.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }
}

fn read_record(path: &Path) -> Result<DownloadCheckpoint> {
    let text = std::fs::read_to_string(path).map_err(|e| store_error("read", path, e))?;
    let cp: DownloadCheckpoint = serde_json::from_str(&text).map_err(|e| {
        FetchError::Checkpoint(format!("failed to parse {}: {}", path.display(), e))
    })?;
    if cp.schema_version > SCHEMA_VERSION {
        return Err(FetchError::Checkpoint(format!(
            "{} uses schema version {} (this build reads up to {})",
            path.display(),
            cp.schema_version,
            SCHEMA_VERSION
        )));
    }
    Ok(cp)
}

fn store_error(op: &str, path: &Path, e: std::io::Error) -> FetchError {
    FetchError::Checkpoint(format!("failed to {} {}: {}", op, path.display(), e))
}
