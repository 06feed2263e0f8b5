//! Progress reporting
//!
//! The fetch engine's coordinator calls a [`ProgressReporter`] once per
//! resolved file and once at the end. Workers never touch the reporter, so a
//! slow renderer delays bookkeeping but never a download.

use crate::helpers::progress::create_file_progress;
use indicatif::ProgressBar;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Fetched,
    /// Already on disk with a verified hash.
    Verified,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Files resolved so far, successful or not.
    pub completed: usize,
    pub total: usize,
    /// Bytes written during this run.
    pub bytes: u64,
    pub path: String,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishState {
    Completed { succeeded: usize, bytes: u64 },
    CompletedWithErrors { succeeded: usize, failed: usize },
    Failed { attempted: usize },
    Interrupted { completed: usize, total: usize },
    Empty,
}

pub trait ProgressReporter: Send + Sync {
    fn on_update(&self, update: ProgressUpdate);
    fn on_finish(&self, state: FinishState);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_update(&self, _update: ProgressUpdate) {}
    fn on_finish(&self, _state: FinishState) {}
}

/// Forwards every event into a channel for push-style front ends.
/// A dropped receiver is ignored.
#[derive(Debug)]
pub struct ChannelReporter {
    tx: Sender<ProgressEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Update(ProgressUpdate),
    Finish(FinishState),
}

impl ChannelReporter {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_update(&self, update: ProgressUpdate) {
        self.send(ProgressEvent::Update(update));
    }

    fn on_finish(&self, state: FinishState) {
        self.send(ProgressEvent::Finish(state));
    }
}

/// indicatif bar counting files, with bytes and the latest path as message.
pub struct TerminalReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for TerminalReporter {
    fn on_update(&self, update: ProgressUpdate) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        let bar = guard.get_or_insert_with(|| create_file_progress(update.total as u64));
        bar.set_position(update.completed as u64);
        match &update.outcome {
            FileOutcome::Failed(err) => {
                bar.println(format!("     failed {}: {}", update.path, err));
            }
            FileOutcome::Fetched | FileOutcome::Verified => {}
        }
        bar.set_message(format!("{} {}", format_bytes(update.bytes), update.path));
    }

    fn on_finish(&self, _state: FinishState) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish_and_clear();
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
