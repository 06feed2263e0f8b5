//! gitslice CLI - fetch one directory of a GitHub repository
//!
//! Usage:
//!   gitslice get <url> [dest]          Download a directory (resumable)
//!   gitslice get <url> --resume        Continue an interrupted download
//!   gitslice get <url> --zip [NAME]    Download and pack into an archive
//!   gitslice checkpoints               List saved downloads

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gitslice::core::output;
use gitslice::{
    FetchError, FetchResult, Fetcher, RepositoryLocation, ResumeOptions, Settings,
    TerminalReporter,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gitslice")]
#[command(about = "Download a single directory from a GitHub repository")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding checkpoint records
    #[arg(long, global = true, env = "GITSLICE_CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the directory at a GitHub URL
    Get {
        /// e.g. https://github.com/owner/repo/tree/main/docs
        url: String,

        /// Where to put the files (defaults to the directory's name)
        dest: Option<PathBuf>,

        /// Continue from saved progress for the same URL and destination
        #[arg(long)]
        resume: bool,

        /// Discard saved progress and start over
        #[arg(long, conflicts_with = "resume")]
        force_restart: bool,

        /// Pack the result into an archive in DEST instead of leaving files
        #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "")]
        zip: Option<String>,

        /// Parallel downloads (1-32)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// List saved downloads that can be resumed
    Checkpoints,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            output::error(&format!("{:#}", err));
            if let Some(hint) = err.downcast_ref::<FetchError>().and_then(FetchError::hint) {
                output::info(hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(dir) = cli.checkpoint_dir {
        settings = settings.with_checkpoint_dir(dir);
    }

    match cli.command {
        Commands::Get {
            url,
            dest,
            resume,
            force_restart,
            zip,
            concurrency,
        } => {
            if let Some(n) = concurrency {
                settings = settings.with_concurrency(n);
            }
            let fetcher = Fetcher::new(settings).with_reporter(Arc::new(TerminalReporter::new()));
            let cancel = fetcher.cancel_token();
            ctrlc::set_handler(move || {
                output::warning("interrupt received; finishing files in flight");
                cancel.cancel();
            })
            .context("Failed to install Ctrl-C handler")?;

            match zip {
                Some(name) => {
                    let dest = dest.unwrap_or_else(|| PathBuf::from("."));
                    let name = Some(name.as_str()).filter(|n| !n.is_empty());
                    let archive = fetcher.fetch_and_archive(&url, &dest, name)?;
                    output::success(&format!("Archive written to {}", archive.display()));
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    let dest = match dest {
                        Some(d) => d,
                        None => default_destination(&url)?,
                    };
                    let options = ResumeOptions {
                        resume,
                        force_restart,
                    };
                    let result = fetcher.fetch_folder_resumable(&url, &dest, options)?;
                    Ok(report(&result, &dest))
                }
            }
        }

        Commands::Checkpoints => {
            let fetcher = Fetcher::new(settings);
            list_checkpoints(&fetcher)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Last subpath component, else the repository name.
fn default_destination(url: &str) -> Result<PathBuf> {
    let location = RepositoryLocation::parse(url)?;
    let name = location
        .leaf_name()
        .unwrap_or(location.repository.as_str())
        .to_owned();
    Ok(PathBuf::from(name))
}

fn report(result: &FetchResult, dest: &Path) -> ExitCode {
    if result.is_empty {
        output::info("The requested path contains no files; nothing was written");
        return ExitCode::SUCCESS;
    }
    if result.is_success() {
        output::success(&format!(
            "Fetched {} file(s) into {}",
            result.succeeded,
            dest.display()
        ));
        return ExitCode::SUCCESS;
    }

    output::warning(&format!(
        "Completed with errors: {} file(s) fetched, {} failed",
        result.succeeded, result.failed
    ));
    for failure in &result.failures {
        output::detail(&format!("{}: {}", failure.relative_path, failure.error));
    }
    output::info("Re-run the same command with --resume to retry only the failed files");
    ExitCode::FAILURE
}

fn list_checkpoints(fetcher: &Fetcher) -> Result<()> {
    let checkpoints = fetcher.list_checkpoints()?;
    if checkpoints.is_empty() {
        output::info(&format!(
            "No saved downloads in {}",
            fetcher.settings().checkpoint_dir.display()
        ));
        return Ok(());
    }

    output::action(&format!("{} saved download(s)", checkpoints.len()));
    for cp in &checkpoints {
        let status = format!(
            "[{}/{} files, {} failed] -> {} ({})",
            cp.completed,
            cp.total,
            cp.failed,
            cp.destination.display(),
            cp.id
        );
        output::list_item(&cp.source_url, &status, cp.failed > 0);
    }
    Ok(())
}
