//! Runtime settings
//!
//! Resolved in layers, later layers win:
//! built-in defaults, `$XDG_CONFIG_DIRS/gitslice/config.toml`,
//! `$XDG_CONFIG_HOME/gitslice/config.toml`, then `GITSLICE_*` environment
//! variables. Front ends apply their own flags on top via the `with_*` setters.
//!
//! ```toml
//! concurrency = 5
//! checkpoint_batch = 10
//! http_timeout_secs = 30
//! checkpoint_dir = "/var/tmp/gitslice"
//! scratch_dir = "/var/tmp"
//! api_base = "https://api.github.com"
//! raw_base = "https://raw.githubusercontent.com"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Worker pool width. Conservative so anonymous clients stay under abuse limits.
pub const DEFAULT_CONCURRENCY: usize = 5;
const MAX_CONCURRENCY: usize = 32;

/// Successful files between checkpoint writes.
pub const DEFAULT_CHECKPOINT_BATCH: usize = 10;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base: String,
    pub raw_base: String,
    pub concurrency: usize,
    pub checkpoint_batch: usize,
    pub http_timeout: Duration,
    pub checkpoint_dir: PathBuf,
    /// Parent for the archive scratch directory; the system temp dir if unset.
    pub scratch_dir: Option<PathBuf>,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            raw_base: DEFAULT_RAW_BASE.to_owned(),
            concurrency: DEFAULT_CONCURRENCY,
            checkpoint_batch: DEFAULT_CHECKPOINT_BATCH,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            checkpoint_dir: default_checkpoint_dir(),
            scratch_dir: None,
            token: None,
        }
    }
}

impl Settings {
    /// Defaults, then config files, then environment.
    pub fn load() -> Result<Self> {
        let mut settings = Self::default();
        for path in find_config_files() {
            if !path.exists() {
                continue;
            }
            let file = read_toml(&path)?;
            settings.apply_file(file);
        }
        settings.apply_env(|name| std::env::var(name).ok());
        Ok(settings)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_checkpoint_batch(mut self, batch: usize) -> Self {
        self.checkpoint_batch = batch.max(1);
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = clamp_timeout(timeout.as_secs());
        self
    }

    /// Point both API and raw-content requests at another host (mirrors, tests).
    pub fn with_bases(mut self, api_base: impl Into<String>, raw_base: impl Into<String>) -> Self {
        self.api_base = trim_base(api_base.into());
        self.raw_base = trim_base(raw_base.into());
        self
    }

    fn apply_file(&mut self, file: ConfigToml) {
        if let Some(v) = file.api_base {
            self.api_base = trim_base(v);
        }
        if let Some(v) = file.raw_base {
            self.raw_base = trim_base(v);
        }
        if let Some(v) = file.concurrency {
            self.concurrency = v.clamp(1, MAX_CONCURRENCY);
        }
        if let Some(v) = file.checkpoint_batch {
            self.checkpoint_batch = v.max(1);
        }
        if let Some(v) = file.http_timeout_secs {
            self.http_timeout = clamp_timeout(v);
        }
        if let Some(v) = file.checkpoint_dir {
            self.checkpoint_dir = v;
        }
        if let Some(v) = file.scratch_dir {
            self.scratch_dir = Some(v);
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("GITSLICE_API_BASE").filter(|v| !v.trim().is_empty()) {
            self.api_base = trim_base(v);
        }
        if let Some(v) = var("GITSLICE_RAW_BASE").filter(|v| !v.trim().is_empty()) {
            self.raw_base = trim_base(v);
        }
        if let Some(v) = var("GITSLICE_CONCURRENCY").and_then(|s| s.trim().parse::<usize>().ok()) {
            self.concurrency = v.clamp(1, MAX_CONCURRENCY);
        }
        if let Some(v) =
            var("GITSLICE_CHECKPOINT_BATCH").and_then(|s| s.trim().parse::<usize>().ok())
        {
            self.checkpoint_batch = v.max(1);
        }
        if let Some(v) = var("GITSLICE_HTTP_TIMEOUT").and_then(|s| s.trim().parse::<u64>().ok()) {
            self.http_timeout = clamp_timeout(v);
        }
        if let Some(v) = var("GITSLICE_CHECKPOINT_DIR").filter(|v| !v.trim().is_empty()) {
            self.checkpoint_dir = PathBuf::from(v);
        }
        if let Some(v) = var("GITSLICE_SCRATCH_DIR").filter(|v| !v.trim().is_empty()) {
            self.scratch_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GITHUB_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.token = Some(v.trim().to_owned());
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigToml {
    api_base: Option<String>,
    raw_base: Option<String>,
    concurrency: Option<usize>,
    checkpoint_batch: Option<usize>,
    http_timeout_secs: Option<u64>,
    checkpoint_dir: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
}

// Clamp to a reasonable range (5-300 seconds)
fn clamp_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(5, 300))
}

fn trim_base(base: String) -> String {
    base.trim().trim_end_matches('/').to_owned()
}

fn xdg_data_home() -> PathBuf {
    if let Ok(raw) = std::env::var("XDG_DATA_HOME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".").join(".local/share"))
}

fn default_checkpoint_dir() -> PathBuf {
    xdg_data_home().join("gitslice").join("checkpoints")
}

fn xdg_config_home() -> PathBuf {
    if let Ok(raw) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".").join(".config"))
}

fn split_xdg_config_dirs() -> Vec<PathBuf> {
    let raw = std::env::var("XDG_CONFIG_DIRS").unwrap_or_else(|_| "/etc/xdg".to_owned());
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn find_config_files() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = split_xdg_config_dirs()
        .into_iter()
        .map(|dir| dir.join("gitslice").join("config.toml"))
        .collect();
    paths.push(xdg_config_home().join("gitslice").join("config.toml"));
    paths
}

fn read_toml(path: &Path) -> Result<ConfigToml> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid TOML in {}", path.display()))
}
