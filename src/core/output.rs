//! Colored terminal output for gitslice
//!
//! Uses owo-colors for terminal colors. Warnings and errors go to stderr so
//! they survive when stdout is piped.

use owo_colors::OwoColorize;

/// Detail lines are suppressed when `GITSLICE_QUIET` is set to anything but "0".
fn quiet() -> bool {
    std::env::var("GITSLICE_QUIET").is_ok_and(|v| !v.is_empty() && v != "0")
}

/// Print an action header (blue, bold)
/// Example: "==> Fetching owner/repo/docs"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print a detail line (dimmed prefix)
/// Example: "     resolved default branch main"
pub fn detail(message: &str) {
    if quiet() {
        return;
    }
    println!("     {}", message.dimmed());
}

/// Print a success message (green)
pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

/// Print an info message (cyan)
pub fn info(message: &str) {
    println!("{} {}", "::".cyan(), message);
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Print a skip message (dimmed)
/// Example: "==> nothing left to fetch, skipping"
pub fn skip(message: &str) {
    println!("{} {}", "==>".dimmed(), message.dimmed());
}

/// Print one checkpoint row in list output. Finished-but-failed jobs are
/// highlighted so they stand out from jobs that were merely interrupted.
pub fn list_item(name: &str, status: &str, has_failures: bool) {
    if has_failures {
        println!("  {} {}", name.yellow(), status.dimmed());
    } else {
        println!("  {} {}", name, status.dimmed());
    }
}
