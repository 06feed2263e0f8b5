//! Small shared utilities
//!
//! - **fs_utils**: safe joins, parent creation, path normalization
//! - **hash**: SHA-256 of files and streams, job fingerprints
//! - **progress**: indicatif bar and spinner styling

pub mod fs_utils;
pub mod hash;
pub mod progress;
