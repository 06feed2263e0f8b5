//! Persisted checkpoint record
//!
//! ## Format
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "id": "3f1c0e...",
//!   "source_url": "https://github.com/o/r/tree/main/docs",
//!   "destination": "/home/me/docs",
//!   "total_files": 12,
//!   "completed": ["a.md", "guide/b.md"],
//!   "file_hashes": { "a.md": "b94d27...", "guide/b.md": "5891b5..." },
//!   "failed": [{ "relative_path": "c.md", "error": "upstream error (HTTP 502)" }],
//!   "created_at": 1700000000,
//!   "last_updated": 1700000042
//! }
//! ```

use crate::helpers::hash::verify_file_hash;
use crate::helpers::fs_utils::join_relative;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Current record layout. Records with a newer version are not read.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub relative_path: String,
    pub error: String,
}

/// Durable progress of one (source URL, destination) job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadCheckpoint {
    pub schema_version: u32,
    /// Location fingerprint; also the record's file stem.
    pub id: String,
    pub source_url: String,
    pub destination: PathBuf,
    pub total_files: usize,
    #[serde(default)]
    pub completed: BTreeSet<String>,
    /// Relative path -> SHA-256 of the content as written.
    #[serde(default)]
    pub file_hashes: BTreeMap<String, String>,
    #[serde(default)]
    pub failed: Vec<FailedEntry>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub last_updated: u64,
}

impl DownloadCheckpoint {
    pub fn new(id: String, source_url: String, destination: PathBuf, total_files: usize) -> Self {
        let now = now_secs();
        Self {
            schema_version: SCHEMA_VERSION,
            id,
            source_url,
            destination,
            total_files,
            completed: BTreeSet::new(),
            file_hashes: BTreeMap::new(),
            failed: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn mark_completed(&mut self, relative: &str, hash: String) {
        self.failed.retain(|f| f.relative_path != relative);
        self.completed.insert(relative.to_owned());
        self.file_hashes.insert(relative.to_owned(), hash);
    }

    /// Record a failure. A path fails at most once per record.
    pub fn mark_failed(&mut self, relative: &str, error: String) {
        self.completed.remove(relative);
        self.file_hashes.remove(relative);
        match self.failed.iter_mut().find(|f| f.relative_path == relative) {
            Some(existing) => existing.error = error,
            None => self.failed.push(FailedEntry {
                relative_path: relative.to_owned(),
                error,
            }),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.completed.len() >= self.total_files
    }

    /// Forget completions for paths no longer in the tree and drop stale
    /// failures; they are retried on this run.
    pub fn rebase(&mut self, current: &HashSet<&str>, total_files: usize) {
        self.completed.retain(|p| current.contains(p.as_str()));
        self.file_hashes.retain(|p, _| current.contains(p.as_str()));
        self.failed.clear();
        self.total_files = total_files;
    }

    /// Re-hash every completed file under `root`. Anything missing, modified,
    /// or without a stored hash is dropped from the completed set and
    /// returned so it gets fetched again.
    pub fn reverify(&mut self, root: &Path) -> Vec<String> {
        let mut dropped = Vec::new();
        for relative in &self.completed {
            let ok = match (self.file_hashes.get(relative), join_relative(root, relative)) {
                (Some(expected), Ok(path)) => verify_file_hash(&path, expected).is_ok(),
                _ => false,
            };
            if !ok {
                dropped.push(relative.clone());
            }
        }
        for relative in &dropped {
            self.completed.remove(relative);
            self.file_hashes.remove(relative);
        }
        dropped
    }

    pub fn touch(&mut self) {
        self.last_updated = now_secs();
    }
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
