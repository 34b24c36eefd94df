//! Run parameters, tool settings and credential loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Immutable per-run parameters, supplied once before processing begins.
#[derive(Debug, Clone)]
pub struct RunParameters {
    /// Target bucket.
    pub bucket: String,
    /// Folder-style key prefix, normalized to end with '/'.
    pub prefix: String,
    /// Whether a successful repair is republished over the remote original.
    pub replace: bool,
}

impl RunParameters {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>, replace: bool) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            bucket: bucket.into(),
            prefix,
            replace,
        }
    }
}

/// Settings for the external avro-tools invocation.
///
/// Loaded from an optional YAML file; every field has a default so an empty
/// file (or no file at all) still yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Java runtime used to launch the tool jar.
    pub java: String,
    /// Path to the avro-tools jar.
    pub jar: PathBuf,
    /// Record limit passed to `cat` during validation.
    pub sample_limit: u64,
    /// Sample rate passed to `cat` during validation.
    pub sample_rate: f64,
    /// Wall-clock timeout per tool invocation, in seconds.
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            jar: PathBuf::from("./bin/avro-tools-1.8.2.jar"),
            sample_limit: 100,
            sample_rate: 1.0,
            timeout_secs: 300,
        }
    }
}

impl ToolConfig {
    /// Loads tool settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Credentials and addressing for the S3 adapter.
///
/// Always an explicit injected value, never process-global state.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub session_token: Option<String>,
    /// Custom endpoint (e.g. a MinIO instance); uses path-style addressing.
    pub endpoint: Option<String>,
}

impl S3Config {
    /// Reads credentials from the environment, failing fast before any
    /// processing if a mandatory variable is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            region: require_env("AWS_REGION")?,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            endpoint: None,
        })
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn prefix_is_normalized_to_folder_style() {
        let params = RunParameters::new("data", "extracts/2022-09-21", false);
        assert_eq!(params.prefix, "extracts/2022-09-21/");

        let already = RunParameters::new("data", "extracts/2022-09-21/", true);
        assert_eq!(already.prefix, "extracts/2022-09-21/");

        let empty = RunParameters::new("data", "", false);
        assert_eq!(empty.prefix, "");
    }

    #[test]
    fn tool_config_defaults_apply_to_partial_files() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "java: /usr/lib/jvm/bin/java\ntimeout_secs: 60").expect("write");

        let config = ToolConfig::load(file.path()).expect("load");
        assert_eq!(config.java, "/usr/lib/jvm/bin/java");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.sample_limit, ToolConfig::default().sample_limit);
        assert_eq!(config.jar, ToolConfig::default().jar);
    }

    #[test]
    fn tool_config_load_reports_missing_file() {
        let err = ToolConfig::load(Path::new("/nonexistent/avromend.yaml"));
        assert!(matches!(err, Err(ConfigError::Read { .. })));
    }
}
