//! Progress bar styling
//!
//! Keeps the bar look in one place for every reporter that draws one.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Standard spinner characters used throughout gitslice
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard tick interval for spinners
const TICK_INTERVAL_MS: u64 = 80;

const FILES_TEMPLATE: &str =
    "     {spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} files {msg}";

fn files_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(FILES_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
        .tick_chars(SPINNER_CHARS)
}

/// Create a bar counting files, with the byte total shown in the message.
pub fn create_file_progress(total_files: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_files);
    pb.set_style(files_style());
    pb.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
    pb
}
