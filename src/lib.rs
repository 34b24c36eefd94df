//! avromend: batch validation and repair of Avro files in object storage.
//!
//! Scans a bucket prefix for Avro data files, checks each one with the
//! external avro-tools validator, attempts a repair on files that fail, and
//! optionally republishes repaired files over the corrupted originals.

// Core modules
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod staging;
pub mod store;
pub mod tool;

// Re-export commonly used error types
pub use error::{ConfigError, StoreError, ToolError};
