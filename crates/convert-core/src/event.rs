//! Events emitted by the batch pipeline.
//!
//! The pipeline pushes [`BatchEvent`]s to a reporter callback and makes no
//! assumption about which thread consumes them. [`channel_reporter`] adapts a
//! `std::sync::mpsc` sender for callers that drain events on another thread.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

/// How many failures the end-of-batch summary lists by name.
pub const MAX_LISTED_FAILURES: usize = 10;

/// A single event from a running batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Free-text line for a log view.
    Log(String),
    /// What is happening right now.
    Status(String),
    /// Archives processed so far out of the batch.
    Progress { current: usize, total: usize },
    /// Images normalized so far within the current archive.
    /// `total == 0` means no sub-task is running.
    SubProgress { current: usize, total: usize },
    /// The batch is over; always the last event.
    Finished(BatchSummary),
}

/// One failed work item and the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub name: String,
    pub reason: String,
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchSummary {
    pub ok: usize,
    pub failed: usize,
    pub failures: Vec<FailedItem>,
    pub output_dir: PathBuf,
}

impl BatchSummary {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            ..Default::default()
        }
    }

    pub fn record_ok(&mut self) {
        self.ok += 1;
    }

    pub fn record_failure(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(FailedItem {
            name: name.into(),
            reason: reason.into(),
        });
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Human-readable end-of-batch report: counts, then up to
    /// [`MAX_LISTED_FAILURES`] failures and a note for the rest.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Done. OK={}, FAIL={}", self.ok, self.failed)];
        for item in self.failures.iter().take(MAX_LISTED_FAILURES) {
            lines.push(format!("  - {}: {}", item.name, item.reason));
        }
        if self.failures.len() > MAX_LISTED_FAILURES {
            lines.push(format!(
                "  ... and {} more failure(s)",
                self.failures.len() - MAX_LISTED_FAILURES
            ));
        }
        lines
    }
}

/// Event reporter callback type.
pub type EventReporter = Box<dyn Fn(BatchEvent) + Send + Sync>;

/// Reporter that forwards every event into a channel.
/// Send errors (receiver gone) are ignored.
pub fn channel_reporter(sender: Sender<BatchEvent>) -> EventReporter {
    Box::new(move |event| {
        let _ = sender.send(event);
    })
}
