//! Fetch one directory of a GitHub repository without cloning it
//!
//! Files are listed through the host's REST API and downloaded in parallel by a
//! small worker pool. Progress is kept in a hash-verified checkpoint so an
//! interrupted or partially failed download can be continued by running the
//! same command again.
//!
//! # Example
//!
//! ```no_run
//! use gitslice::{Fetcher, ResumeOptions, Settings};
//! use std::path::Path;
//!
//! let fetcher = Fetcher::new(Settings::load()?);
//! let result = fetcher.fetch_folder_resumable(
//!     "https://github.com/rust-lang/rust/tree/master/src/doc",
//!     Path::new("doc"),
//!     ResumeOptions { resume: true, force_restart: false },
//! )?;
//! println!("{} fetched, {} failed", result.succeeded, result.failed);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Layout
//!
//! - [`location`] - URL parsing
//! - [`remote`] - host seam, GitHub adapter, tree resolution
//! - [`checkpoint`] - persisted progress records
//! - [`fetch`] - worker pool
//! - [`archive`] - zip / tar.gz packing
//! - [`progress`] - reporter contract
//! - [`engine`] - [`Fetcher`], the operations front ends call

pub mod archive;
pub mod checkpoint;
pub mod core;
pub mod engine;
pub mod fetch;
pub mod helpers;
pub mod location;
pub mod progress;
pub mod remote;

pub use checkpoint::{CheckpointStore, CheckpointSummary, DownloadCheckpoint};
pub use crate::core::config::Settings;
pub use crate::core::error::{FetchError, Result};
pub use engine::{Fetcher, ResumeOptions};
pub use fetch::{CancelToken, FetchResult};
pub use location::RepositoryLocation;
pub use progress::{
    ChannelReporter, FileOutcome, FinishState, NoopReporter, ProgressEvent, ProgressReporter,
    ProgressUpdate, TerminalReporter,
};
pub use remote::{EntryKind, RemoteHost, TreeEntry};
