//! Tree resolution: default branch, recursive listing, subpath filter.

use super::{EntryKind, RemoteHost, TreeEntry};
use crate::core::error::{FetchError, Result};
use crate::core::output;
use crate::location::RepositoryLocation;

/// The filtered listing for one location, with the branch pinned.
#[derive(Debug, Clone)]
pub struct ResolvedTree {
    /// Input location with `branch` always non-empty.
    pub location: RepositoryLocation,
    /// Entries under the subpath, paths still repository-relative.
    pub entries: Vec<TreeEntry>,
    /// Listing may be incomplete even after the narrower retry.
    pub truncated: bool,
}

impl ResolvedTree {
    /// Destination-relative paths of every file, in listing order.
    pub fn file_paths(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|e| e.is_file())
            .map(|e| {
                (
                    e.path.clone(),
                    relative_path(&e.path, &self.location.subpath).to_owned(),
                )
            })
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_file()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }
}

/// Resolve `location` to the filtered list of entries under its subpath.
///
/// Every host error propagates. A non-empty subpath that matches nothing in a
/// complete listing is `NotFound`.
pub fn resolve_tree(host: &dyn RemoteHost, location: &RepositoryLocation) -> Result<ResolvedTree> {
    let location = if location.branch.is_empty() {
        let branch = host.default_branch(location)?;
        if branch.trim().is_empty() {
            return Err(FetchError::MissingDefaultBranch(location.slug()));
        }
        location.with_branch(branch)
    } else {
        location.clone()
    };

    let listing = host.tree(&location, &location.branch)?;
    let mut entries = listing.entries;
    let mut truncated = listing.truncated;

    if truncated && !location.subpath.is_empty() {
        let narrowed = format!("{}:{}", location.branch, location.subpath);
        match host.tree(&location, &narrowed) {
            Ok(sub) => {
                entries = sub
                    .entries
                    .into_iter()
                    .map(|e| TreeEntry {
                        path: format!("{}/{}", location.subpath, e.path),
                        kind: e.kind,
                    })
                    .collect();
                truncated = sub.truncated;
            }
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                output::detail(&format!("narrowed listing of {} failed: {}", narrowed, e));
            }
        }
    }

    if truncated {
        output::warning(&format!(
            "tree listing for {} was truncated by the host; some files may be missing",
            location
        ));
    }

    let subpath_exists = location.subpath.is_empty()
        || entries.iter().any(|e| e.path == location.subpath);
    let filtered = filter_entries(&entries, &location.subpath);

    if filtered.is_empty() && !subpath_exists && !truncated {
        return Err(FetchError::NotFound(format!(
            "path '{}' in {} @ {}",
            location.subpath,
            location.slug(),
            location.branch
        )));
    }

    Ok(ResolvedTree {
        location,
        entries: filtered,
        truncated,
    })
}

/// Keep entries strictly under `subpath/`; an empty subpath keeps everything.
///
/// A subpath naming a single file (a `blob` URL) keeps just that file.
pub fn filter_entries(entries: &[TreeEntry], subpath: &str) -> Vec<TreeEntry> {
    if subpath.is_empty() {
        return entries.to_vec();
    }
    let prefix = format!("{}/", subpath);
    let under: Vec<TreeEntry> = entries
        .iter()
        .filter(|e| e.path.starts_with(&prefix))
        .cloned()
        .collect();
    if !under.is_empty() {
        return under;
    }
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::File && e.path == subpath)
        .cloned()
        .collect()
}

/// Path of `path` relative to `subpath`. A file requested directly maps to
/// its own name.
pub fn relative_path<'a>(path: &'a str, subpath: &str) -> &'a str {
    if subpath.is_empty() {
        return path;
    }
    match path.strip_prefix(subpath) {
        Some(rest) if rest.starts_with('/') => &rest[1..],
        Some("") => path.rsplit('/').next().unwrap_or(path),
        _ => path,
    }
}
