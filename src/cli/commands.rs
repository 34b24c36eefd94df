//! CLI command definitions for avromend.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::config::{RunParameters, S3Config, ToolConfig};
use crate::pipeline::BatchDriver;
use crate::staging::StagingArea;
use crate::store::S3ObjectStore;
use crate::tool::{AvroToolkit, AvroToolsCli, Validation};

/// Default staging directory for downloaded and repaired files.
const DEFAULT_STAGING_DIR: &str = "./avro";

/// Batch validation and repair of Avro files in object storage.
#[derive(Parser)]
#[command(name = "avromend")]
#[command(about = "Validate and repair Avro files stored under an S3 prefix")]
#[command(version)]
#[command(
    long_about = "avromend scans an S3 prefix for Avro data files, checks each one with the\n\
external avro-tools validator, attempts a repair on files that fail, and\n\
optionally republishes repaired files over the corrupted originals.\n\n\
Example usage:\n  avromend run --bucket prod-datalake --prefix extracts/data=2022-09-21/ --replace"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Scan a prefix, repair corrupted files, optionally republish them.
    Run(RunArgs),

    /// Validate a single local Avro file and report pass/fail.
    Check(CheckArgs),
}

/// Arguments for `avromend run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Target bucket.
    #[arg(short, long, env = "AVROMEND_BUCKET")]
    pub bucket: String,

    /// Folder-style key prefix to scan.
    #[arg(short, long, env = "AVROMEND_PREFIX")]
    pub prefix: String,

    /// Republish repaired files over the corrupted remote originals.
    #[arg(long)]
    pub replace: bool,

    /// Staging directory for downloaded and repaired files.
    #[arg(long, default_value = DEFAULT_STAGING_DIR)]
    pub staging_dir: PathBuf,

    /// YAML file with avro-tools settings (java path, jar path, timeout).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Custom S3 endpoint (e.g. a MinIO instance).
    #[arg(long, env = "AVROMEND_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Write the run summary as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Arguments for `avromend check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Local Avro file to validate.
    pub file: PathBuf,

    /// YAML file with avro-tools settings (java path, jar path, timeout).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Parses CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses CLI arguments and runs the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Runs the selected command with pre-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_batch(args).await,
        Commands::Check(args) => check_file(args).await,
    }
}

async fn run_batch(args: RunArgs) -> anyhow::Result<()> {
    let tool_config = load_tool_config(args.config.as_deref())?;

    // Credentials are checked before any processing starts.
    let mut s3_config = S3Config::from_env()?;
    if args.endpoint.is_some() {
        s3_config.endpoint = args.endpoint.clone();
    }

    let store = Arc::new(S3ObjectStore::new(s3_config));
    let toolkit = Arc::new(AvroToolsCli::new(tool_config));
    let staging = StagingArea::new(&args.staging_dir);
    let params = RunParameters::new(args.bucket, args.prefix, args.replace);

    info!(
        "scanning '{}/{}' (replace: {})",
        params.bucket, params.prefix, params.replace
    );

    let driver = BatchDriver::new(store, toolkit, staging, params);
    let summary = driver.run().await?;

    if let Some(path) = &args.report {
        fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        info!("run summary written to {}", path.display());
    }

    Ok(())
}

async fn check_file(args: CheckArgs) -> anyhow::Result<()> {
    let tool_config = load_tool_config(args.config.as_deref())?;
    let toolkit = AvroToolsCli::new(tool_config);

    match toolkit.validate(&args.file).await? {
        Validation::Pass => {
            info!("{}: valid", args.file.display());
            Ok(())
        }
        Validation::Fail { diagnostic } => {
            warn!("{}: failed validation: {}", args.file.display(), diagnostic);
            anyhow::bail!("'{}' failed validation", args.file.display())
        }
    }
}

fn load_tool_config(path: Option<&std::path::Path>) -> anyhow::Result<ToolConfig> {
    match path {
        Some(path) => Ok(ToolConfig::load(path)?),
        None => Ok(ToolConfig::default()),
    }
}
