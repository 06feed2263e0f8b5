//! Remote host access
//!
//! The fetch engine and tree resolver only talk to a [`RemoteHost`]. The
//! production implementation is [`GitHubHost`]; tests plug in their own.

mod github;
mod tree;

pub use github::GitHubHost;
pub use tree::{ResolvedTree, filter_entries, relative_path, resolve_tree};

use crate::core::error::Result;
use crate::location::RepositoryLocation;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// One record from the host's recursive listing. `path` is relative to the
/// repository root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// A recursive listing as returned by the host.
#[derive(Debug, Clone, Default)]
pub struct RemoteTree {
    pub entries: Vec<TreeEntry>,
    /// Host reported the listing was cut short.
    pub truncated: bool,
}

/// Streaming body of one file.
pub type ContentReader = Box<dyn Read + Send>;

pub trait RemoteHost: Send + Sync {
    /// Name of the repository's default branch.
    fn default_branch(&self, location: &RepositoryLocation) -> Result<String>;

    /// Recursive listing of `tree_ish` (a branch name, or `branch:dir` to
    /// list a single directory). Paths are relative to that tree.
    fn tree(&self, location: &RepositoryLocation, tree_ish: &str) -> Result<RemoteTree>;

    /// Raw content of `path` at `location.branch`. The branch is always set.
    fn open_file(&self, location: &RepositoryLocation, path: &str) -> Result<ContentReader>;
}
