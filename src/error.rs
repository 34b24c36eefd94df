//! Error types for avromend operations.
//!
//! Defines error types for the major subsystems:
//! - Object-store transport (listing, download, upload)
//! - External tool invocation (avro-tools subprocess)
//! - Configuration and credential loading
//!
//! Transport errors abort the remaining batch; tool-invocation errors are
//! absorbed per candidate by the repair pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by object-store operations.
///
/// These are transport failures. The batch driver treats them as fatal for
/// the run: already-processed candidates keep their outcomes, remaining
/// candidates are not started.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{operation} '{key}' returned status {status}: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        key: String,
        status: u16,
        body: String,
    },

    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while invoking the external avro-tools process.
///
/// The repair pipeline maps these to failed validation/repair steps; they
/// never abort the batch.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exceeded the {limit_secs}s timeout")]
    TimedOut { command: String, limit_secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading configuration or credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}
