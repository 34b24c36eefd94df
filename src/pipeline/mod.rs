//! Per-object repair pipeline and the batch driver around it.

mod driver;
mod progress;
mod repair;

pub use driver::BatchDriver;
pub use progress::{ProgressTracker, RunSummary};
pub use repair::RepairPipeline;

use std::path::PathBuf;

use serde::Serialize;

/// Terminal result for one candidate object. Never downgraded once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Passed validation on the first check; no repair attempted.
    ValidOriginal,
    /// Repaired and re-validated; kept locally for inspection, not republished.
    RepairedAndKept,
    /// Repaired, re-validated and uploaded over the corrupted remote original.
    RepairedAndReplaced,
    /// Failed validation and the repair output failed re-validation too.
    Unrepairable,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::ValidOriginal => "valid",
            Outcome::RepairedAndKept => "repaired (kept locally)",
            Outcome::RepairedAndReplaced => "repaired and replaced",
            Outcome::Unrepairable => "unrepairable",
        }
    }
}

/// One object moving through the pipeline.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Remote key, unique within a listing.
    pub key: String,
    /// Local staging path, assigned on fetch.
    pub local_path: Option<PathBuf>,
    /// Last diagnostic message from a failed validation or repair.
    pub diagnostic: Option<String>,
}

impl Candidate {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            local_path: None,
            diagnostic: None,
        }
    }
}
