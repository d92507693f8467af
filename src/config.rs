use crate::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES, RetryPolicy};
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MAX_PARALLEL_WRITES: usize = 4;
const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Tuning for one worksheet engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub retry: RetryPolicy,
    /// Upper bound on chunk writes in flight within one flush category.
    pub max_parallel_writes: usize,
    /// Buffered `CellsChanged` events per subscriber before lagging.
    pub notification_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_parallel_writes: DEFAULT_MAX_PARALLEL_WRITES,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl SyncConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_parallel_writes(mut self, max: usize) -> Self {
        self.max_parallel_writes = max.max(1);
        self
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            max_retries: cli_max_retries,
            retry_delay_ms: cli_retry_delay_ms,
            max_parallel_writes: cli_max_parallel_writes,
            notification_capacity: cli_notification_capacity,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            max_retries: file_max_retries,
            retry_delay_ms: file_retry_delay_ms,
            max_parallel_writes: file_max_parallel_writes,
            notification_capacity: file_notification_capacity,
        } = file_config;

        let max_retries = cli_max_retries
            .or(file_max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let retry_delay_ms = cli_retry_delay_ms
            .or(file_retry_delay_ms)
            .unwrap_or(DEFAULT_BASE_DELAY_MS);
        let max_parallel_writes = cli_max_parallel_writes
            .or(file_max_parallel_writes)
            .unwrap_or(DEFAULT_MAX_PARALLEL_WRITES)
            .max(1);
        let notification_capacity = cli_notification_capacity
            .or(file_notification_capacity)
            .unwrap_or(DEFAULT_NOTIFICATION_CAPACITY)
            .max(1);

        Ok(Self {
            retry: RetryPolicy::new(max_retries, Duration::from_millis(retry_delay_ms)),
            max_parallel_writes,
            notification_capacity,
        })
    }
}

/// Engine settings shared by every binary; flattened into their parsers.
#[derive(Parser, Debug, Default, Clone)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEET_SYNC_MAX_RETRIES",
        value_name = "N",
        help = "Retries after a busy surface before giving up (default 10)",
        global = true
    )]
    pub max_retries: Option<u32>,

    #[arg(
        long,
        env = "SHEET_SYNC_RETRY_DELAY_MS",
        value_name = "MS",
        help = "Base back-off delay; retry n waits n times this (default 100)",
        global = true
    )]
    pub retry_delay_ms: Option<u64>,

    #[arg(
        long,
        env = "SHEET_SYNC_MAX_PARALLEL_WRITES",
        value_name = "N",
        help = "Chunk writes in flight per flush category (default 4)",
        global = true
    )]
    pub max_parallel_writes: Option<usize>,

    #[arg(
        long,
        env = "SHEET_SYNC_NOTIFICATION_CAPACITY",
        value_name = "N",
        help = "Buffered change events per subscriber (default 64)",
        global = true
    )]
    pub notification_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    max_parallel_writes: Option<usize>,
    notification_capacity: Option<usize>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
