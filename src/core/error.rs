//! Error taxonomy for fetching, resuming and archiving.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the fetch pipeline.
///
/// Resolution errors (`InvalidLocation` through `InvalidResponse`) abort a run
/// before any checkpoint exists. Per-file errors are recorded and only escalate
/// to `TotalFailure` when nothing succeeded.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid repository location '{input}': {reason}")]
    InvalidLocation { input: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded{}", reset_suffix(.reset_at))]
    RateLimited { reset_at: Option<u64> },

    #[error("access forbidden: {0}")]
    Forbidden(String),

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("repository {0} did not report a default branch")]
    MissingDefaultBranch(String),

    #[error("unexpected response from host: {0}")]
    InvalidResponse(String),

    #[error("completed with errors: {succeeded} file(s) fetched, {failed} failed")]
    PartialFailure { succeeded: usize, failed: usize },

    #[error("all {attempted} file(s) failed to download")]
    TotalFailure { attempted: usize },

    #[error("integrity check failed for {path}\n  expected: {expected}\n  got:      {actual}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("nothing to archive: {0} contains no files")]
    ArchiveEmptySource(PathBuf),

    #[error("interrupted after {completed}/{total} file(s)")]
    Interrupted { completed: usize, total: usize },

    #[error("this download is already running in another process (lock: {})", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn reset_suffix(reset_at: &Option<u64>) -> String {
    match reset_at {
        Some(t) => format!(" (resets at unix time {t})"),
        None => String::new(),
    }
}

impl FetchError {
    /// Whether repeating the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. }
            | Self::NetworkUnavailable(_)
            | Self::PartialFailure { .. }
            | Self::TotalFailure { .. }
            | Self::Interrupted { .. }
            | Self::AlreadyRunning(_) => true,
            Self::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// A short remediation hint for front ends, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RateLimited { .. } => {
                Some("wait for the rate limit to reset or set GITHUB_TOKEN")
            }
            Self::PartialFailure { .. } | Self::TotalFailure { .. } => {
                Some("re-run the same command with --resume to retry only the failed files")
            }
            Self::Interrupted { .. } => Some("re-run the same command with --resume"),
            Self::NetworkUnavailable(_) => Some("check your network connection"),
            Self::AlreadyRunning(_) => Some("wait for the other run to finish"),
            _ => None,
        }
    }
}

pub type Result<T, E = FetchError> = std::result::Result<T, E>;
