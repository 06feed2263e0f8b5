//! Fetcher: the operations front ends call
//!
//! Wires location parsing, tree resolution, the checkpoint store, the worker
//! pool and the archiver together. Front ends build one [`Fetcher`] and call
//! [`fetch_folder`](Fetcher::fetch_folder),
//! [`fetch_folder_resumable`](Fetcher::fetch_folder_resumable),
//! [`fetch_and_archive`](Fetcher::fetch_and_archive) or
//! [`list_checkpoints`](Fetcher::list_checkpoints).

use crate::archive::{create_archive, default_archive_name};
use crate::checkpoint::{CheckpointStore, CheckpointSummary, DownloadCheckpoint};
use crate::core::config::Settings;
use crate::core::error::{FetchError, Result};
use crate::core::lock::acquire_job_lock;
use crate::core::output;
use crate::fetch::{CancelToken, FetchPool, FetchResult, FileJob, Persistence, PoolReport};
use crate::helpers::fs_utils::absolute_normalized;
use crate::location::RepositoryLocation;
use crate::progress::{FileOutcome, FinishState, NoopReporter, ProgressReporter, ProgressUpdate};
use crate::remote::{GitHubHost, RemoteHost, ResolvedTree, resolve_tree};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a resumable fetch treats an existing checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeOptions {
    /// Continue from a matching checkpoint. Without it an existing record is
    /// replaced by a fresh one.
    pub resume: bool,
    /// Delete any matching checkpoint before starting.
    pub force_restart: bool,
}

pub struct Fetcher {
    settings: Settings,
    host: Arc<dyn RemoteHost>,
    store: CheckpointStore,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancelToken,
}

impl Fetcher {
    /// Fetcher talking to GitHub with the given settings.
    pub fn new(settings: Settings) -> Self {
        let host = Arc::new(GitHubHost::new(&settings));
        Self::with_host(settings, host)
    }

    /// Fetcher over any host implementation.
    pub fn with_host(settings: Settings, host: Arc<dyn RemoteHost>) -> Self {
        let store = CheckpointStore::new(settings.checkpoint_dir.clone());
        Self {
            settings,
            host,
            store,
            reporter: Arc::new(NoopReporter),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops dispatching new files when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Fetch the folder at `url` into `destination` without checkpointing.
    pub fn fetch_folder(&self, url: &str, destination: &Path) -> Result<FetchResult> {
        let location = RepositoryLocation::parse(url)?;
        self.fetch_plain(&location, destination).map(|(_, result)| result)
    }

    /// Fetch with a persisted checkpoint so an interrupted or partially
    /// failed run can be continued by repeating the same call.
    pub fn fetch_folder_resumable(
        &self,
        url: &str,
        destination: &Path,
        options: ResumeOptions,
    ) -> Result<FetchResult> {
        let location = RepositoryLocation::parse(url)?;
        let source_url = location.canonical_url();
        let destination = absolute_normalized(destination)?;
        let id = CheckpointStore::fingerprint_for(&source_url, &destination)?;
        // Only contention is fatal; an unusable store degrades to an
        // unlocked run without persisted progress.
        let _lock = match acquire_job_lock(&self.store.lock_path(&id)) {
            Ok(lock) => Some(lock),
            Err(e @ FetchError::AlreadyRunning(_)) => return Err(e),
            Err(e) => {
                output::warning(&format!("continuing without a job lock: {}", e));
                None
            }
        };

        if options.force_restart {
            output::detail("discarding any saved progress for this download");
            self.cleanup_best_effort(&source_url, &destination);
        }

        let mut existing = match self.store.load(&source_url, &destination)? {
            Some(cp) if options.resume => Some(cp),
            Some(cp) => {
                output::info(&format!(
                    "found saved progress ({}/{} files); starting over. Pass --resume to continue it",
                    cp.completed.len(),
                    cp.total_files
                ));
                None
            }
            None => None,
        };

        // A finished record only needs local verification.
        let mut verified = false;
        if let Some(cp) = existing.as_mut()
            && cp.total_files > 0
            && cp.is_complete()
        {
            let dropped = cp.reverify(&destination);
            if dropped.is_empty() {
                return Ok(self.finish_verified(cp, &source_url, &destination));
            }
            report_requeued(&dropped);
            verified = true;
        }

        output::action(&format!("Fetching {}", location));
        let tree = resolve_tree(self.host.as_ref(), &location)?;
        log_resolved(&tree);

        let files = tree.file_paths();
        if files.is_empty() {
            self.cleanup_best_effort(&source_url, &destination);
            return Ok(self.finish_empty());
        }
        let total = files.len();

        let mut checkpoint = match existing {
            Some(mut cp) => {
                let current: HashSet<&str> = files.iter().map(|(_, rel)| rel.as_str()).collect();
                cp.rebase(&current, total);
                if !verified {
                    report_requeued(&cp.reverify(&destination));
                }
                output::info(&format!(
                    "resuming: {}/{} file(s) already verified",
                    cp.completed.len(),
                    total
                ));
                cp
            }
            None => self
                .store
                .create_new(&source_url, &destination, total)
                .unwrap_or_else(|e| {
                    output::warning(&format!("could not save checkpoint: {}", e));
                    DownloadCheckpoint::new(id.clone(), source_url.clone(), destination.clone(), total)
                }),
        };

        let jobs: Vec<FileJob> = files
            .into_iter()
            .filter(|(_, rel)| !checkpoint.completed.contains(rel))
            .map(|(remote_path, relative)| FileJob {
                remote_path,
                relative,
            })
            .collect();
        let already_done = total - jobs.len();

        let report = self.pool(&tree.location, &destination).run(
            jobs,
            already_done,
            total,
            Some(Persistence {
                store: &self.store,
                checkpoint: &mut checkpoint,
                batch: self.settings.checkpoint_batch,
            }),
        );

        if report.failures.is_empty() && !report.interrupted() {
            self.cleanup_best_effort(&source_url, &destination);
        } else if let Err(e) = self.store.save(&mut checkpoint) {
            output::warning(&format!("could not save checkpoint: {}", e));
        }

        self.conclude(report, already_done, total)
    }

    /// Fetch into a private scratch directory and pack it into
    /// `destination/<archive_name>`. The scratch directory is removed on
    /// every path out of this function.
    pub fn fetch_and_archive(
        &self,
        url: &str,
        destination: &Path,
        archive_name: Option<&str>,
    ) -> Result<PathBuf> {
        let location = RepositoryLocation::parse(url)?;
        let mut builder = tempfile::Builder::new();
        builder.prefix("gitslice-");
        let scratch = match &self.settings.scratch_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let (resolved, result) = self.fetch_plain(&location, scratch.path())?;
        if result.is_empty {
            return Err(FetchError::ArchiveEmptySource(PathBuf::from(
                resolved.to_string(),
            )));
        }
        if !result.is_success() {
            output::warning(&format!(
                "archiving partial result: {} file(s) failed to download",
                result.failed
            ));
        }

        let name = archive_name
            .map(with_archive_extension)
            .unwrap_or_else(|| default_archive_name(&resolved));
        let archive_path = destination.join(name);
        create_archive(scratch.path(), &archive_path)?;

        if let Err(e) = scratch.close() {
            output::warning(&format!("could not remove scratch directory: {}", e));
        }
        Ok(archive_path)
    }

    /// Every saved checkpoint, most recent first.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointSummary>> {
        self.store.list()
    }

    fn fetch_plain(
        &self,
        location: &RepositoryLocation,
        destination: &Path,
    ) -> Result<(RepositoryLocation, FetchResult)> {
        output::action(&format!("Fetching {}", location));
        let tree = resolve_tree(self.host.as_ref(), location)?;
        log_resolved(&tree);

        let files = tree.file_paths();
        if files.is_empty() {
            return Ok((tree.location, self.finish_empty()));
        }
        let total = files.len();
        let jobs = files
            .into_iter()
            .map(|(remote_path, relative)| FileJob {
                remote_path,
                relative,
            })
            .collect();

        let report = self.pool(&tree.location, destination).run(jobs, 0, total, None);
        let result = self.conclude(report, 0, total)?;
        Ok((tree.location, result))
    }

    fn pool<'a>(&'a self, location: &'a RepositoryLocation, destination: &'a Path) -> FetchPool<'a> {
        FetchPool {
            host: self.host.as_ref(),
            location,
            destination,
            concurrency: self.settings.concurrency,
            reporter: self.reporter.as_ref(),
            cancel: &self.cancel,
        }
    }

    /// Map a pool report onto the final result and notify the reporter.
    fn conclude(&self, report: PoolReport, already_done: usize, total: usize) -> Result<FetchResult> {
        let succeeded = already_done + report.succeeded;
        let failed = report.failures.len();

        if report.interrupted() {
            self.reporter.on_finish(FinishState::Interrupted {
                completed: succeeded,
                total,
            });
            return Err(FetchError::Interrupted {
                completed: succeeded,
                total,
            });
        }
        if succeeded == 0 {
            self.reporter
                .on_finish(FinishState::Failed { attempted: failed });
            return Err(FetchError::TotalFailure { attempted: failed });
        }

        self.reporter.on_finish(if failed == 0 {
            FinishState::Completed {
                succeeded,
                bytes: report.bytes,
            }
        } else {
            FinishState::CompletedWithErrors { succeeded, failed }
        });

        Ok(FetchResult {
            succeeded,
            failed,
            is_empty: false,
            bytes: report.bytes,
            failures: report.failures,
        })
    }

    fn finish_verified(
        &self,
        checkpoint: &DownloadCheckpoint,
        source_url: &str,
        destination: &Path,
    ) -> FetchResult {
        let total = checkpoint.completed.len();
        for (i, path) in checkpoint.completed.iter().enumerate() {
            self.reporter.on_update(ProgressUpdate {
                completed: i + 1,
                total,
                bytes: 0,
                path: path.clone(),
                outcome: FileOutcome::Verified,
            });
        }
        output::skip(&format!(
            "all {} file(s) already present and verified",
            total
        ));
        self.cleanup_best_effort(source_url, destination);
        self.reporter.on_finish(FinishState::Completed {
            succeeded: total,
            bytes: 0,
        });
        FetchResult {
            succeeded: total,
            ..FetchResult::default()
        }
    }

    fn finish_empty(&self) -> FetchResult {
        output::skip("nothing to fetch: the requested path contains no files");
        self.reporter.on_finish(FinishState::Empty);
        FetchResult::empty()
    }

    fn cleanup_best_effort(&self, source_url: &str, destination: &Path) {
        if let Err(e) = self.store.cleanup(source_url, destination) {
            output::warning(&format!("could not remove checkpoint: {}", e));
        }
    }
}

fn log_resolved(tree: &ResolvedTree) {
    output::detail(&format!(
        "{} file(s) on branch {}",
        tree.file_count(),
        tree.location.branch
    ));
}

fn report_requeued(dropped: &[String]) {
    if dropped.is_empty() {
        return;
    }
    output::warning(&format!(
        "{} file(s) missing or modified since last run; fetching again",
        dropped.len()
    ));
    for path in dropped {
        output::detail(&format!("re-queued {}", path));
    }
}

/// Archive names without a known extension get `.zip`.
fn with_archive_extension(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.ends_with(".zip") || lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        name.to_owned()
    } else {
        format!("{}.zip", name)
    }
}
