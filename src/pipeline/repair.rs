//! The per-object repair state machine.
//!
//! Drives one candidate from fetched to a terminal outcome:
//! fetch -> validate -> (repair + re-validate) -> (publish) -> cleanup.
//!
//! Validation is the single source of truth for "is this file usable" and is
//! applied identically to originals and to repair output. A repair candidate
//! is never trusted on the repair tool's own success claim.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::RunParameters;
use crate::error::StoreError;
use crate::pipeline::{Candidate, Outcome};
use crate::staging::StagingArea;
use crate::store::{Fetcher, ObjectStore, Publisher};
use crate::tool::{AvroToolkit, Validation};

pub struct RepairPipeline {
    store: Arc<dyn ObjectStore>,
    toolkit: Arc<dyn AvroToolkit>,
    staging: StagingArea,
    params: RunParameters,
}

impl RepairPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        toolkit: Arc<dyn AvroToolkit>,
        staging: StagingArea,
        params: RunParameters,
    ) -> Self {
        Self {
            store,
            toolkit,
            staging,
            params,
        }
    }

    /// Drives one candidate to a terminal outcome.
    ///
    /// Tool-invocation failures are absorbed as failed steps and never abort
    /// the batch. Object-store and local-IO errors propagate to the driver.
    pub async fn process_one(&self, candidate: &mut Candidate) -> Result<Outcome, StoreError> {
        let fetcher = Fetcher::new(self.store.clone(), self.staging.clone());
        let local = fetcher.fetch(&self.params.bucket, &candidate.key).await?;
        candidate.local_path = Some(local.clone());

        match self.toolkit.validate(&local).await {
            Ok(Validation::Pass) => {
                self.staging.remove_if_present(&local)?;
                info!("{}: valid", candidate.key);
                return Ok(Outcome::ValidOriginal);
            }
            Ok(Validation::Fail { diagnostic }) => {
                warn!("{}: failed validation: {}", candidate.key, diagnostic);
                candidate.diagnostic = Some(diagnostic);
            }
            Err(err) => {
                warn!("{}: validator did not run: {}", candidate.key, err);
                candidate.diagnostic = Some(err.to_string());
            }
        }

        let repaired = match self.toolkit.repair(&local).await {
            Ok(path) => path,
            Err(err) => {
                error!("{}: repair tool failed: {}", candidate.key, err);
                candidate.diagnostic = Some(err.to_string());
                return Ok(Outcome::Unrepairable);
            }
        };

        // Re-validate the repair output before trusting it.
        let verdict = self.toolkit.validate(&repaired).await;
        let diagnostic = match verdict {
            Ok(Validation::Pass) => None,
            Ok(Validation::Fail { diagnostic }) => Some(diagnostic),
            Err(err) => Some(err.to_string()),
        };
        if let Some(diagnostic) = diagnostic {
            self.staging.remove_if_present(&repaired)?;
            warn!(
                "{}: repair output failed re-validation, original retained: {}",
                candidate.key, diagnostic
            );
            candidate.diagnostic = Some(diagnostic);
            return Ok(Outcome::Unrepairable);
        }

        // The verified candidate takes over the original's local name.
        self.staging.promote(&repaired, &local)?;
        info!("{}: repaired", candidate.key);

        if self.params.replace {
            let publisher = Publisher::new(self.store.clone());
            let key = publisher
                .publish(&self.params.bucket, &self.params.prefix, &local)
                .await?;
            self.staging.remove_if_present(&local)?;
            info!("{}: republished as '{}'", candidate.key, key);
            Ok(Outcome::RepairedAndReplaced)
        } else {
            Ok(Outcome::RepairedAndKept)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::ToolError;
    use crate::store::MemoryObjectStore;
    use crate::tool::repaired_path;

    const REPAIRED_BYTES: &[u8] = b"repaired-bytes";

    /// Scripted toolkit: pops one verdict per validate call, writes a fixed
    /// repair candidate next to the input.
    struct ScriptedToolkit {
        verdicts: Mutex<VecDeque<Result<Validation, ToolError>>>,
        repair_fails: bool,
        validate_calls: AtomicUsize,
        repair_calls: AtomicUsize,
    }

    impl ScriptedToolkit {
        fn new(verdicts: Vec<Result<Validation, ToolError>>) -> Self {
            Self {
                verdicts: Mutex::new(verdicts.into()),
                repair_fails: false,
                validate_calls: AtomicUsize::new(0),
                repair_calls: AtomicUsize::new(0),
            }
        }

        fn with_failing_repair(mut self) -> Self {
            self.repair_fails = true;
            self
        }

        fn fail(diagnostic: &str) -> Result<Validation, ToolError> {
            Ok(Validation::Fail {
                diagnostic: diagnostic.to_string(),
            })
        }
    }

    #[async_trait]
    impl AvroToolkit for ScriptedToolkit {
        async fn validate(&self, _input: &Path) -> Result<Validation, ToolError> {
            self.validate_calls.fetch_add(1, Ordering::Relaxed);
            self.verdicts
                .lock()
                .expect("verdict lock")
                .pop_front()
                .expect("unexpected validate call")
        }

        async fn repair(&self, input: &Path) -> Result<PathBuf, ToolError> {
            self.repair_calls.fetch_add(1, Ordering::Relaxed);
            if self.repair_fails {
                return Err(ToolError::Spawn {
                    command: "java".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no java"),
                });
            }
            let output = repaired_path(input);
            std::fs::write(&output, REPAIRED_BYTES)?;
            Ok(output)
        }
    }

    struct Fixture {
        store: Arc<MemoryObjectStore>,
        toolkit: Arc<ScriptedToolkit>,
        pipeline: RepairPipeline,
        _dir: tempfile::TempDir,
        staging_root: PathBuf,
    }

    fn fixture(toolkit: ScriptedToolkit, replace: bool) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging_root = dir.path().to_path_buf();

        let store = Arc::new(MemoryObjectStore::new());
        store.insert("data", "extracts/part-0001.avro", b"corrupt-bytes".to_vec());

        let toolkit = Arc::new(toolkit);
        let pipeline = RepairPipeline::new(
            store.clone(),
            toolkit.clone(),
            StagingArea::new(&staging_root),
            RunParameters::new("data", "extracts/", replace),
        );

        Fixture {
            store,
            toolkit,
            pipeline,
            _dir: dir,
            staging_root,
        }
    }

    fn staged(fixture: &Fixture, name: &str) -> PathBuf {
        fixture.staging_root.join(name)
    }

    #[tokio::test]
    async fn valid_original_is_cleaned_up_without_repair_or_publish() {
        let f = fixture(ScriptedToolkit::new(vec![Ok(Validation::Pass)]), true);
        let mut candidate = Candidate::new("extracts/part-0001.avro");

        let outcome = f
            .pipeline
            .process_one(&mut candidate)
            .await
            .expect("process");

        assert_eq!(outcome, Outcome::ValidOriginal);
        assert!(!staged(&f, "part-0001.avro").exists());
        assert_eq!(f.toolkit.repair_calls.load(Ordering::Relaxed), 0);
        assert_eq!(f.store.put_count(), 0);
    }

    #[tokio::test]
    async fn repaired_without_replace_keeps_the_local_file() {
        let f = fixture(
            ScriptedToolkit::new(vec![
                ScriptedToolkit::fail("bad sync marker"),
                Ok(Validation::Pass),
            ]),
            false,
        );
        let mut candidate = Candidate::new("extracts/part-0001.avro");

        let outcome = f
            .pipeline
            .process_one(&mut candidate)
            .await
            .expect("process");

        assert_eq!(outcome, Outcome::RepairedAndKept);
        // Repaired bytes now live at the original's local name.
        assert_eq!(
            std::fs::read(staged(&f, "part-0001.avro")).expect("read"),
            REPAIRED_BYTES
        );
        assert!(!staged(&f, "repaired.part-0001.avro").exists());
        assert_eq!(f.store.put_count(), 0);
    }

    #[tokio::test]
    async fn repaired_with_replace_publishes_exactly_once_under_original_key() {
        let f = fixture(
            ScriptedToolkit::new(vec![
                ScriptedToolkit::fail("bad sync marker"),
                Ok(Validation::Pass),
            ]),
            true,
        );
        let mut candidate = Candidate::new("extracts/part-0001.avro");

        let outcome = f
            .pipeline
            .process_one(&mut candidate)
            .await
            .expect("process");

        assert_eq!(outcome, Outcome::RepairedAndReplaced);
        assert_eq!(f.store.put_count(), 1);
        assert_eq!(
            f.store.object("data", "extracts/part-0001.avro"),
            Some(REPAIRED_BYTES.to_vec())
        );
        // Local copy is gone after a successful publish.
        assert!(!staged(&f, "part-0001.avro").exists());
        assert!(!staged(&f, "repaired.part-0001.avro").exists());
    }

    #[tokio::test]
    async fn failed_revalidation_retains_original_and_deletes_candidate() {
        let f = fixture(
            ScriptedToolkit::new(vec![
                ScriptedToolkit::fail("bad sync marker"),
                ScriptedToolkit::fail("still truncated"),
            ]),
            true,
        );
        let mut candidate = Candidate::new("extracts/part-0001.avro");

        let outcome = f
            .pipeline
            .process_one(&mut candidate)
            .await
            .expect("process");

        assert_eq!(outcome, Outcome::Unrepairable);
        assert_eq!(
            std::fs::read(staged(&f, "part-0001.avro")).expect("read"),
            b"corrupt-bytes"
        );
        assert!(!staged(&f, "repaired.part-0001.avro").exists());
        assert_eq!(f.store.put_count(), 0);
        assert_eq!(candidate.diagnostic.as_deref(), Some("still truncated"));
    }

    #[tokio::test]
    async fn validator_tool_error_still_triggers_a_repair_attempt() {
        // Spawn failure on the first validation counts as "fail", then the
        // repair path runs and its output is re-validated.
        let f = fixture(
            ScriptedToolkit::new(vec![
                Err(ToolError::TimedOut {
                    command: "java".to_string(),
                    limit_secs: 300,
                }),
                Ok(Validation::Pass),
            ]),
            false,
        );
        let mut candidate = Candidate::new("extracts/part-0001.avro");

        let outcome = f
            .pipeline
            .process_one(&mut candidate)
            .await
            .expect("process");

        assert_eq!(outcome, Outcome::RepairedAndKept);
        assert_eq!(f.toolkit.repair_calls.load(Ordering::Relaxed), 1);
        assert_eq!(f.toolkit.validate_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn repair_tool_error_is_absorbed_as_unrepairable() {
        let f = fixture(
            ScriptedToolkit::new(vec![ScriptedToolkit::fail("bad header")])
                .with_failing_repair(),
            true,
        );
        let mut candidate = Candidate::new("extracts/part-0001.avro");

        let outcome = f
            .pipeline
            .process_one(&mut candidate)
            .await
            .expect("tool failure must not surface");

        assert_eq!(outcome, Outcome::Unrepairable);
        assert!(staged(&f, "part-0001.avro").exists());
        assert_eq!(f.store.put_count(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_propagates_to_the_caller() {
        let f = fixture(ScriptedToolkit::new(vec![]), false);
        let mut candidate = Candidate::new("extracts/absent.avro");

        let err = f
            .pipeline
            .process_one(&mut candidate)
            .await
            .expect_err("transport error must propagate");

        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(f.toolkit.validate_calls.load(Ordering::Relaxed), 0);
    }
}
