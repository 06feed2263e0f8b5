//! Core infrastructure: settings, errors, job locks, terminal output.

pub mod config;
pub mod error;
pub mod lock;
pub mod output;
