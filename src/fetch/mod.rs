//! Bounded-concurrency fetch engine
//!
//! A fixed number of scoped worker threads pull [`FileJob`]s from a shared
//! queue. Each worker does one blocking download-and-write at a time and
//! reports the outcome over a channel. The calling thread is the only
//! consumer of that channel: it alone updates counters, the checkpoint
//! record and the progress reporter, and it alone writes the checkpoint to
//! disk.

mod cancel;

pub use cancel::CancelToken;

use crate::checkpoint::{CheckpointStore, DownloadCheckpoint, FailedEntry};
use crate::core::error::{FetchError, Result};
use crate::core::output;
use crate::helpers::fs_utils::{ensure_parent_dir, join_relative};
use crate::helpers::hash::HashingWriter;
use crate::location::RepositoryLocation;
use crate::progress::{FileOutcome, ProgressReporter, ProgressUpdate};
use crate::remote::RemoteHost;
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Mutex;
use std::sync::mpsc;

/// One file to retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    /// Repository-relative path, as the host knows it.
    pub remote_path: String,
    /// Path under the destination root.
    pub relative: String,
}

/// Outcome of a fetch. Never claims success while `failed > 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub succeeded: usize,
    pub failed: usize,
    /// Nothing matched the request; not an error.
    pub is_empty: bool,
    pub bytes: u64,
    pub failures: Vec<FailedEntry>,
}

impl FetchResult {
    pub fn empty() -> Self {
        Self {
            is_empty: true,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Turn a partial result into `PartialFailure`.
    pub fn ensure_complete(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::PartialFailure {
                succeeded: self.succeeded,
                failed: self.failed,
            })
        }
    }
}

/// Checkpoint the coordinator keeps current while the pool runs.
pub struct Persistence<'a> {
    pub store: &'a CheckpointStore,
    pub checkpoint: &'a mut DownloadCheckpoint,
    /// Successful files between writes.
    pub batch: usize,
}

/// What one pool run did.
#[derive(Debug, Default)]
pub struct PoolReport {
    pub succeeded: usize,
    pub failures: Vec<FailedEntry>,
    pub bytes: u64,
    /// Jobs never started because of cancellation.
    pub not_started: usize,
}

impl PoolReport {
    pub fn interrupted(&self) -> bool {
        self.not_started > 0
    }
}

/// Shared inputs for a pool run.
pub struct FetchPool<'a> {
    pub host: &'a dyn RemoteHost,
    /// Location with the branch already resolved.
    pub location: &'a RepositoryLocation,
    pub destination: &'a Path,
    pub concurrency: usize,
    pub reporter: &'a dyn ProgressReporter,
    pub cancel: &'a CancelToken,
}

enum WorkerEvent {
    Fetched { job: FileJob, bytes: u64, hash: String },
    Failed { job: FileJob, error: String },
}

impl FetchPool<'_> {
    /// Fetch every job. `already_done` files count towards progress but
    /// are not fetched; `total` is the full file count for this request.
    pub fn run(
        &self,
        jobs: Vec<FileJob>,
        already_done: usize,
        total: usize,
        mut persistence: Option<Persistence<'_>>,
    ) -> PoolReport {
        let job_count = jobs.len();
        let mut report = PoolReport::default();
        if job_count == 0 {
            return report;
        }

        let width = self.concurrency.clamp(1, job_count);
        let queue = Mutex::new(VecDeque::from(jobs));
        let (tx, rx) = mpsc::channel::<WorkerEvent>();

        let mut resolved = 0usize;
        let mut since_save = 0usize;

        std::thread::scope(|scope| {
            for _ in 0..width {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || self.worker(queue, tx));
            }
            drop(tx);

            for event in rx {
                resolved += 1;
                let (path, outcome) = match event {
                    WorkerEvent::Fetched { job, bytes, hash } => {
                        report.succeeded += 1;
                        report.bytes += bytes;
                        if let Some(p) = persistence.as_mut() {
                            p.checkpoint.mark_completed(&job.relative, hash);
                            since_save += 1;
                            if since_save >= p.batch {
                                since_save = 0;
                                save_best_effort(p);
                            }
                        }
                        (job.relative, FileOutcome::Fetched)
                    }
                    WorkerEvent::Failed { job, error } => {
                        output::detail(&format!("failed {}: {}", job.relative, error));
                        if let Some(p) = persistence.as_mut() {
                            p.checkpoint.mark_failed(&job.relative, error.clone());
                        }
                        report.failures.push(FailedEntry {
                            relative_path: job.relative.clone(),
                            error: error.clone(),
                        });
                        (job.relative, FileOutcome::Failed(error))
                    }
                };
                self.reporter.on_update(ProgressUpdate {
                    completed: already_done + resolved,
                    total,
                    bytes: report.bytes,
                    path,
                    outcome,
                });
            }
        });

        report.not_started = job_count - resolved;
        report
    }

    fn worker(&self, queue: &Mutex<VecDeque<FileJob>>, tx: mpsc::Sender<WorkerEvent>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let next = match queue.lock() {
                Ok(mut q) => q.pop_front(),
                Err(poisoned) => poisoned.into_inner().pop_front(),
            };
            let Some(job) = next else {
                break;
            };
            let event = match fetch_one(self.host, self.location, self.destination, &job) {
                Ok((bytes, hash)) => WorkerEvent::Fetched { job, bytes, hash },
                Err(e) => WorkerEvent::Failed {
                    job,
                    error: e.to_string(),
                },
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    }
}

/// Persist without failing the run; durability here is best effort.
pub(crate) fn save_best_effort(p: &mut Persistence<'_>) {
    if let Err(e) = p.store.save(p.checkpoint) {
        output::warning(&format!("could not save checkpoint: {}", e));
    }
}

/// Download one file to `destination/relative`, returning (bytes, sha256).
/// The target is only created once the host has answered; a body that fails
/// mid-stream leaves nothing behind.
fn fetch_one(
    host: &dyn RemoteHost,
    location: &RepositoryLocation,
    destination: &Path,
    job: &FileJob,
) -> Result<(u64, String)> {
    let target = join_relative(destination, &job.relative)?;
    let mut reader = host.open_file(location, &job.remote_path)?;
    ensure_parent_dir(&target)?;

    let file = File::create(&target)?;
    let mut writer = HashingWriter::new(BufWriter::new(file));
    let written = match std::io::copy(&mut reader, &mut writer) {
        Ok(_) => writer.finish(),
        Err(e) => Err(e),
    };
    match written {
        Ok(result) => Ok(result),
        Err(e) => {
            let _ = std::fs::remove_file(&target);
            Err(e.into())
        }
    }
}
