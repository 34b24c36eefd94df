//! Batch driver: lists candidates and runs them through the pipeline
//! sequentially.

use std::sync::Arc;

use tracing::info;

use crate::config::RunParameters;
use crate::error::StoreError;
use crate::pipeline::{Candidate, ProgressTracker, RepairPipeline, RunSummary};
use crate::staging::StagingArea;
use crate::store::ObjectStore;
use crate::tool::AvroToolkit;

pub struct BatchDriver {
    store: Arc<dyn ObjectStore>,
    staging: StagingArea,
    params: RunParameters,
    pipeline: RepairPipeline,
}

impl BatchDriver {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        toolkit: Arc<dyn AvroToolkit>,
        staging: StagingArea,
        params: RunParameters,
    ) -> Self {
        let pipeline = RepairPipeline::new(
            store.clone(),
            toolkit,
            staging.clone(),
            params.clone(),
        );
        Self {
            store,
            staging,
            params,
            pipeline,
        }
    }

    /// Runs the whole batch.
    ///
    /// Candidate N+1 never starts before candidate N reaches a terminal
    /// state. An error not absorbed by the pipeline aborts the remaining
    /// candidates; already-processed candidates keep their outcomes.
    pub async fn run(&self) -> Result<RunSummary, StoreError> {
        let mut keys = self
            .store
            .list(&self.params.bucket, &self.params.prefix)
            .await?;
        // Folder markers have no body to validate.
        keys.retain(|key| !key.ends_with('/'));

        if keys.is_empty() {
            info!(
                "no files found under '{}/{}'",
                self.params.bucket, self.params.prefix
            );
            return Ok(RunSummary::empty());
        }

        self.staging.ensure()?;
        let mut progress = ProgressTracker::new(keys.len());

        for key in keys {
            let mut candidate = Candidate::new(key);
            let outcome = self.pipeline.process_one(&mut candidate).await?;
            progress.record(&candidate.key, outcome);
        }

        let summary = progress.summary();
        info!(
            "run complete: {} processed, {} valid, {} repaired ({} replaced), {} unrepairable",
            summary.processed,
            summary.valid,
            summary.repaired_kept + summary.repaired_replaced,
            summary.repaired_replaced,
            summary.unrepairable
        );
        Ok(summary)
    }
}
