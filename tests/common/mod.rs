//! Shared fixtures for behavioural tests: an instrumented in-memory host and
//! helpers for building fetchers against temp directories.

#![allow(dead_code)]

use gitslice::helpers::hash::hash_file;
use gitslice::remote::{ContentReader, RemoteTree};
use gitslice::{
    CancelToken, CheckpointStore, FetchError, Fetcher, RemoteHost, RepositoryLocation, Result,
    Settings, TreeEntry,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Repository held in memory. Counts every call and can be told to fail
/// single files or go offline entirely.
#[derive(Default)]
pub struct MemoryHost {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    delay: Duration,
    requests: AtomicUsize,
    file_requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    cancel_after: Mutex<Option<(usize, CancelToken)>>,
}

impl MemoryHost {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: Mutex::new(
                files
                    .iter()
                    .map(|(p, body)| (p.to_string(), body.as_bytes().to_vec()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_path(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_owned());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn remove_file(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    /// Cancel `token` once `n` file downloads have been answered.
    pub fn cancel_after(&self, n: usize, token: CancelToken) {
        *self.cancel_after.lock().unwrap() = Some((n, token));
    }

    pub fn total_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn file_requests(&self) -> Vec<String> {
        let mut v = self.file_requests.lock().unwrap().clone();
        v.sort();
        v
    }

    pub fn clear_file_requests(&self) {
        self.file_requests.lock().unwrap().clear();
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::NetworkUnavailable("offline".into()));
        }
        Ok(())
    }
}

impl RemoteHost for MemoryHost {
    fn default_branch(&self, _: &RepositoryLocation) -> Result<String> {
        self.check_online()?;
        Ok("main".into())
    }

    fn tree(&self, _: &RepositoryLocation, _tree_ish: &str) -> Result<RemoteTree> {
        self.check_online()?;
        let files = self.files.lock().unwrap();
        let mut dirs = BTreeSet::new();
        for path in files.keys() {
            let mut acc = String::new();
            let parts: Vec<&str> = path.split('/').collect();
            for part in &parts[..parts.len() - 1] {
                if !acc.is_empty() {
                    acc.push('/');
                }
                acc.push_str(part);
                dirs.insert(acc.clone());
            }
        }
        let mut entries: Vec<TreeEntry> = dirs.into_iter().map(TreeEntry::dir).collect();
        entries.extend(files.keys().cloned().map(TreeEntry::file));
        Ok(RemoteTree {
            entries,
            truncated: false,
        })
    }

    fn open_file(&self, location: &RepositoryLocation, path: &str) -> Result<ContentReader> {
        self.check_online()?;
        assert!(!location.branch.is_empty(), "file fetched without a branch");
        self.file_requests.lock().unwrap().push(path.to_owned());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let served = self.file_requests.lock().unwrap().len();
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref()
            && served >= *after
        {
            token.cancel();
        }

        if self.failing.lock().unwrap().contains(path) {
            return Err(FetchError::Upstream {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        match self.files.lock().unwrap().get(path) {
            Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
            None => Err(FetchError::NotFound(path.to_owned())),
        }
    }
}

/// Three files under `docs/`, two outside, plus a look-alike sibling.
pub const REPO: &[(&str, &str)] = &[
    ("docs/index.md", "# Index"),
    ("docs/guide/start.md", "start here"),
    ("docs/guide/deep/more.md", "more"),
    ("docs2/readme", "not me"),
    ("src/lib.rs", "pub fn x() {}"),
];

pub const DOCS_URL: &str = "https://github.com/o/r/tree/main/docs";

pub struct TestEnv {
    pub dir: TempDir,
    pub dest: PathBuf,
    pub checkpoints: PathBuf,
    pub scratch: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out");
        let checkpoints = dir.path().join("checkpoints");
        let scratch = dir.path().join("scratch");
        Self {
            dir,
            dest,
            checkpoints,
            scratch,
        }
    }

    pub fn settings(&self) -> Settings {
        Settings::default()
            .with_checkpoint_dir(&self.checkpoints)
            .with_scratch_dir(&self.scratch)
            .with_concurrency(3)
    }

    /// Archive scratch directories still present under `scratch`.
    pub fn scratch_leftovers(&self) -> Vec<String> {
        match std::fs::read_dir(&self.scratch) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn fetcher(&self, host: &Arc<MemoryHost>) -> Fetcher {
        Fetcher::with_host(self.settings(), host.clone())
    }

    pub fn store(&self) -> CheckpointStore {
        CheckpointStore::new(&self.checkpoints)
    }

    /// Number of persisted checkpoint records.
    pub fn record_count(&self) -> usize {
        match std::fs::read_dir(&self.checkpoints) {
            Ok(entries) => entries
                .flatten()
                .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
                .count(),
            Err(_) => 0,
        }
    }

    /// Write the record a crashed run would leave behind after finishing
    /// every file but before removing its checkpoint.
    pub fn write_complete_checkpoint(&self, url: &str) {
        let source = RepositoryLocation::parse(url).unwrap().canonical_url();
        let files = list_files(&self.dest);
        let store = self.store();
        let mut cp = store.create_new(&source, &self.dest, files.len()).unwrap();
        for rel in files {
            let hash = hash_file(&self.dest.join(&rel)).unwrap();
            cp.mark_completed(&rel, hash);
        }
        store.save(&mut cp).unwrap();
    }
}

/// Relative paths of every file under `root`, sorted, `/`-separated.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut out: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    out.sort();
    out
}
