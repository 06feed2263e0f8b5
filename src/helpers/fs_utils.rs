//! Common filesystem utilities
//!
//! Provides shared filesystem operations used by the fetch engine and archiver.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Ensure a file's parent directory exists.
///
/// Creates the parent directory (and all ancestors) if it doesn't exist.
/// Safe to call concurrently for the same directory.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Check if path is safe (no path traversal).
///
/// Rejects absolute paths and paths containing "..".
pub fn is_safe_path(path: &Path) -> bool {
    !path.is_absolute()
        && !path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}

/// Join a slash-separated repository path onto `root`, rejecting traversal.
pub fn join_relative(root: &Path, relative: &str) -> io::Result<PathBuf> {
    let rel = Path::new(relative);
    if relative.is_empty() || !is_safe_path(rel) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsafe path (contains .. or is absolute): {}", relative),
        ));
    }
    Ok(root.join(rel))
}

/// Make `path` absolute against the current directory without touching the
/// filesystem, then fold `.` and `..` lexically so equal destinations compare
/// equal. Symlinks are not resolved.
pub fn absolute_normalized(path: &Path) -> io::Result<PathBuf> {
    let abs = std::path::absolute(path)?;
    let mut out = PathBuf::new();
    for component in abs.components() {
        match component {
            Component::CurDir => {}
            // `pop` on the root is a no-op, matching `/..` == `/`.
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
