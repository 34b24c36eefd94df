//! External avro-tools invocation: validation and repair as a subprocess.
//!
//! The binary format itself is a black box here. Structural integrity is
//! whatever the external tool says it is, applied identically to downloaded
//! originals and to repair output.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolConfig;
use crate::error::ToolError;

/// Captured result of a single subprocess execution.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Rendered command line, for diagnostics.
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolInvocation {
    /// Zero exit status and an empty error stream. A non-empty error stream,
    /// even with a zero exit status, fails validation.
    pub fn clean(&self) -> bool {
        self.exit_code == 0 && self.stderr.trim().is_empty()
    }

    /// Diagnostic text for a failed invocation: stderr verbatim when present,
    /// the exit status otherwise.
    pub fn diagnostic(&self) -> String {
        if self.stderr.trim().is_empty() {
            format!("exit status {}", self.exit_code)
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Outcome of one validation pass over a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Pass,
    Fail { diagnostic: String },
}

impl Validation {
    pub fn passed(&self) -> bool {
        matches!(self, Validation::Pass)
    }
}

/// Spawns an external executable and captures exit status and both streams.
///
/// Every invocation runs under a bounded wall-clock timeout; a hung tool is
/// killed and reported as [`ToolError::TimedOut`].
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run(&self, program: &str, args: &[String]) -> Result<ToolInvocation, ToolError> {
        let rendered = format!("{} {}", program, args.join(" "));
        debug!("running: {}", rendered);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| ToolError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::TimedOut {
                command: rendered.clone(),
                limit_secs: self.timeout.as_secs(),
            })??;

        Ok(ToolInvocation {
            command: rendered,
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Validate/repair capability over a local file.
///
/// The pipeline only ever talks to this trait, so orchestration tests run
/// against scripted fakes instead of the real jar.
#[async_trait]
pub trait AvroToolkit: Send + Sync {
    /// Checks structural integrity of `input`. Tool-level failures (spawn
    /// error, timeout) surface as `Err`; the caller decides their meaning.
    async fn validate(&self, input: &Path) -> Result<Validation, ToolError>;

    /// Produces a repair candidate for `input` at a derived sibling path and
    /// returns that path. The candidate must not be trusted until it has
    /// independently passed [`AvroToolkit::validate`].
    async fn repair(&self, input: &Path) -> Result<PathBuf, ToolError>;
}

/// The real toolkit: `java -jar avro-tools.jar` subcommands.
pub struct AvroToolsCli {
    config: ToolConfig,
    invoker: ToolInvoker,
}

impl AvroToolsCli {
    pub fn new(config: ToolConfig) -> Self {
        let invoker = ToolInvoker::new(config.timeout());
        Self { config, invoker }
    }

    fn jar(&self) -> String {
        self.config.jar.to_string_lossy().to_string()
    }
}

#[async_trait]
impl AvroToolkit for AvroToolsCli {
    async fn validate(&self, input: &Path) -> Result<Validation, ToolError> {
        let scratch = scratch_path(input);
        let sidecar = crc_sidecar_path(&scratch);

        let args = vec![
            "-jar".to_string(),
            self.jar(),
            "cat".to_string(),
            "--offset".to_string(),
            "0".to_string(),
            "--limit".to_string(),
            self.config.sample_limit.to_string(),
            "--samplerate".to_string(),
            self.config.sample_rate.to_string(),
            input.to_string_lossy().to_string(),
            scratch.to_string_lossy().to_string(),
        ];

        let result = self.invoker.run(&self.config.java, &args).await;

        // Scratch output and its checksum sidecar are never kept, pass or fail.
        remove_if_present(&scratch)?;
        remove_if_present(&sidecar)?;

        let invocation = result?;
        if invocation.clean() {
            Ok(Validation::Pass)
        } else {
            Ok(Validation::Fail {
                diagnostic: invocation.diagnostic(),
            })
        }
    }

    async fn repair(&self, input: &Path) -> Result<PathBuf, ToolError> {
        let output = repaired_path(input);

        let args = vec![
            "-jar".to_string(),
            self.jar(),
            "repair".to_string(),
            input.to_string_lossy().to_string(),
            output.to_string_lossy().to_string(),
        ];

        match self.invoker.run(&self.config.java, &args).await {
            Ok(invocation) => {
                // The repair tool's own streams are informational only;
                // success is decided by re-validation of the output.
                if !invocation.stdout.trim().is_empty() {
                    debug!("repair output: {}", invocation.stdout.trim());
                }
                Ok(output)
            }
            Err(err) => {
                // A failed invocation may leave a partial candidate behind.
                remove_if_present(&output)?;
                Err(err)
            }
        }
    }
}

/// Repair candidate path: `repaired.<name>` next to the input.
pub fn repaired_path(input: &Path) -> PathBuf {
    sibling(input, |name| format!("repaired.{name}"))
}

/// Validation scratch output: `sample.<name>` next to the input.
fn scratch_path(input: &Path) -> PathBuf {
    sibling(input, |name| format!("sample.{name}"))
}

/// Hadoop-style checksum sidecar written next to the scratch output.
fn crc_sidecar_path(scratch: &Path) -> PathBuf {
    sibling(scratch, |name| format!(".{name}.crc"))
}

fn sibling(path: &Path, rename: impl Fn(&str) -> String) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(rename(&name))
}

fn remove_if_present(path: &Path) -> Result<(), ToolError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ToolError::Io(err)),
    }
}
