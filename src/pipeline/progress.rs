//! Progress tracking for a batch run.
//!
//! Notified once per completed candidate; keeps per-outcome tallies and emits
//! a log line so operators can follow long runs.

use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::pipeline::Outcome;

/// Per-outcome counters for one run.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    processed: usize,
    valid: usize,
    repaired_kept: usize,
    repaired_replaced: usize,
    unrepairable: usize,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            valid: 0,
            repaired_kept: 0,
            repaired_replaced: 0,
            unrepairable: 0,
            started: Instant::now(),
        }
    }

    /// Records one completed candidate, regardless of its outcome.
    pub fn record(&mut self, key: &str, outcome: Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::ValidOriginal => self.valid += 1,
            Outcome::RepairedAndKept => self.repaired_kept += 1,
            Outcome::RepairedAndReplaced => self.repaired_replaced += 1,
            Outcome::Unrepairable => self.unrepairable += 1,
        }
        info!(
            "[{}/{}] {}: {}",
            self.processed,
            self.total,
            key,
            outcome.label()
        );
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total: self.total,
            processed: self.processed,
            valid: self.valid,
            repaired_kept: self.repaired_kept,
            repaired_replaced: self.repaired_replaced,
            unrepairable: self.unrepairable,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Structured result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub valid: usize,
    pub repaired_kept: usize,
    pub repaired_replaced: usize,
    pub unrepairable: usize,
    pub elapsed_secs: f64,
    pub finished_at: String,
}

impl RunSummary {
    pub fn empty() -> Self {
        ProgressTracker::new(0).summary()
    }
}
