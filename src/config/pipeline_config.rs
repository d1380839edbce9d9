use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

const DEFAULT_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// SQS accepts at most ten messages per receive.
const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub tickers: Vec<String>,

    /// Pause between consecutive chart requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// How often `run` starts a fetch cycle.
    #[serde(default = "default_fetch_interval_secs")]
    pub fetch_interval_secs: u64,

    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_chart_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            base_url: default_chart_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// SQS queue URL; only needed for the aws backend.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Long-poll wait on receive.
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u64,

    /// Pause before polling again after a batch failed.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: None,
            batch_size: default_batch_size(),
            wait_time_secs: default_wait_time_secs(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,

    /// Overrides the virtual-hosted S3 endpoint with a path-style one, e.g. a local MinIO.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Root directory for the dry-run blob store.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_manifest_key")]
    pub manifest_key: String,
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline config {}", path.display()))?;

        Self::from_yaml(&raw)
            .with_context(|| format!("failed to load pipeline config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut config: PipelineConfig =
            serde_yaml::from_str(raw).context("failed to parse pipeline config")?;

        config.tickers = config
            .tickers
            .iter()
            .map(|ticker| ticker.trim().to_uppercase())
            .collect();

        config
            .validate()
            .context("pipeline config validation failed")?;

        Ok(config)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.queue.retry_delay_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.tickers.is_empty() {
            bail!("tickers must not be empty");
        }
        if self.tickers.iter().any(|ticker| ticker.is_empty()) {
            bail!("tickers must not contain blank entries");
        }
        if self.fetch_interval_secs == 0 {
            bail!("fetch_interval_secs must be > 0");
        }
        if self.queue.batch_size == 0 || self.queue.batch_size > MAX_BATCH_SIZE {
            bail!("queue.batch_size must be within 1..={MAX_BATCH_SIZE}");
        }
        if self.storage.bucket.trim().is_empty() {
            bail!("storage.bucket must not be empty");
        }
        if self.storage.prefix.trim_matches('/').is_empty() {
            bail!("storage.prefix must not be empty");
        }
        if self.storage.manifest_key.trim().is_empty() {
            bail!("storage.manifest_key must not be empty");
        }
        Ok(())
    }
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_fetch_interval_secs() -> u64 {
    300
}

fn default_chart_url() -> String {
    DEFAULT_CHART_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_wait_time_secs() -> u64 {
    20
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_local_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_prefix() -> String {
    "stock_data".to_string()
}

fn default_manifest_key() -> String {
    "manifest.json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
tickers: [aapl, " GOOG ", MSFT]
storage:
  bucket: stock-data-bucket
"#;

    #[test]
    fn fills_defaults_and_normalizes_tickers() {
        let config = PipelineConfig::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.tickers, vec!["AAPL", "GOOG", "MSFT"]);
        assert_eq!(config.request_delay(), Duration::from_millis(500));
        assert_eq!(config.fetch_interval(), Duration::from_secs(300));
        assert_eq!(config.chart.base_url, DEFAULT_CHART_URL);
        assert_eq!(config.queue.batch_size, 10);
        assert!(config.queue.url.is_none());
        assert_eq!(config.storage.prefix, "stock_data");
        assert_eq!(config.storage.manifest_key, "manifest.json");
        assert_eq!(config.storage.local_root, PathBuf::from("data"));
    }

    #[test]
    fn rejects_empty_ticker_list() {
        let raw = "tickers: []\nstorage:\n  bucket: b\n";

        assert!(PipelineConfig::from_yaml(raw).is_err());
    }

    #[test]
    fn rejects_oversized_batch() {
        let raw = "tickers: [AAPL]\nqueue:\n  batch_size: 11\nstorage:\n  bucket: b\n";

        assert!(PipelineConfig::from_yaml(raw).is_err());
    }

    #[test]
    fn rejects_missing_bucket() {
        assert!(PipelineConfig::from_yaml("tickers: [AAPL]\n").is_err());
        assert!(PipelineConfig::from_yaml("tickers: [AAPL]\nstorage:\n  bucket: ''\n").is_err());
    }
}
