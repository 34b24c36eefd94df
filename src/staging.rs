//! Local staging area for per-object temporary files.
//!
//! Every candidate stages its download under the object's base name. Repair
//! candidates and validation scratch files live in the same directory under
//! derived names; they are removed before a candidate reaches a terminal
//! state, so the directory stays bounded over a long run.

use std::io;
use std::path::{Path, PathBuf};

/// A working directory holding downloaded originals and repair candidates.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the staging directory if it does not exist.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Deterministic local path for a remote key: the key's base name inside
    /// the staging directory.
    pub fn original_path(&self, key: &str) -> PathBuf {
        self.root.join(base_name(key))
    }

    /// Removes a file, tolerating one that is already gone.
    pub fn remove_if_present(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Moves a verified repair candidate over the original's local name.
    pub fn promote(&self, candidate: &Path, original: &Path) -> io::Result<()> {
        self.remove_if_present(original)?;
        std::fs::rename(candidate, original)
    }
}

/// Base name of a folder-style object key.
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
