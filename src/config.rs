use anyhow::{Context, Result};

// ============================================================================
// Configuration defaults
// ============================================================================

/// Public Honeycomb collector endpoint.
pub const DEFAULT_API_HOST: &str = "https://api.honeycomb.io";

const DEFAULT_SAMPLE_RATE: u32 = 1;
const DEFAULT_BATCH_SIZE_TRIGGER: usize = 50;
const DEFAULT_BATCH_TIME_TRIGGER_MS: u64 = 100;
const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 10;
const DEFAULT_PENDING_WORK_CAPACITY: usize = 10_000;
const DEFAULT_MAX_RESPONSE_QUEUE_SIZE: usize = 1_000;

/// Client configuration.
///
/// Write key and dataset are required; everything else has the collector's
/// conventional defaults and passes through to the transmission engine
/// unmodified.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Write key for your Honeycomb team. Required.
    pub write_key: String,

    /// Name of the dataset that should contain submitted events. Required.
    /// An event payload may override this per event via a `dataset` field.
    pub dataset: String,

    /// Server host to receive events.
    pub api_host: String,

    /// Optional proxy to send events through.
    pub proxy: Option<String>,

    /// Sample rate. A rate of N keeps roughly 1/N of events and drops the
    /// rest; dropped events settle as a sampling drop, not a failure.
    pub sample_rate: u32,

    /// A batch is sent once this many events are queued.
    pub batch_size_trigger: usize,

    /// A batch is sent once this many milliseconds have passed since it opened.
    pub batch_time_trigger_ms: u64,

    /// Upper bound on batches being sent concurrently.
    pub max_concurrent_batches: usize,

    /// Maximum number of events queued for sending before new ones are
    /// dropped with a queue-overflow acknowledgment.
    pub pending_work_capacity: usize,

    /// Maximum number of acknowledgment batches queued before they are
    /// dropped.
    pub max_response_queue_size: usize,

    /// Suppress transmission entirely. Submitted events produce no
    /// acknowledgments and therefore time out; useful for tests.
    pub disabled: bool,
}

impl ClientConfig {
    /// Create a configuration with the given credentials and every other
    /// option at its default.
    pub fn new(write_key: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            write_key: write_key.into(),
            dataset: dataset.into(),
            api_host: DEFAULT_API_HOST.to_string(),
            proxy: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            batch_size_trigger: DEFAULT_BATCH_SIZE_TRIGGER,
            batch_time_trigger_ms: DEFAULT_BATCH_TIME_TRIGGER_MS,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
            pending_work_capacity: DEFAULT_PENDING_WORK_CAPACITY,
            max_response_queue_size: DEFAULT_MAX_RESPONSE_QUEUE_SIZE,
            disabled: false,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Expected environment variables:
    /// - `HONEYCOMB_WRITE_KEY`: required
    /// - `HONEYCOMB_DATASET`: required
    /// - `HONEYCOMB_API_HOST`: optional, defaults to the public collector
    /// - `HONEYCOMB_PROXY`: optional
    /// - `HONEYCOMB_SAMPLE_RATE`: optional, defaults to 1 (no sampling)
    /// - `HONEYCOMB_BATCH_SIZE_TRIGGER`: optional, defaults to 50
    /// - `HONEYCOMB_BATCH_TIME_TRIGGER_MS`: optional, defaults to 100
    /// - `HONEYCOMB_MAX_CONCURRENT_BATCHES`: optional, defaults to 10
    /// - `HONEYCOMB_PENDING_WORK_CAPACITY`: optional, defaults to 10000
    /// - `HONEYCOMB_MAX_RESPONSE_QUEUE_SIZE`: optional, defaults to 1000
    /// - `HONEYCOMB_DISABLED`: optional, defaults to false
    pub fn from_env() -> Result<Self> {
        let write_key =
            std::env::var("HONEYCOMB_WRITE_KEY").context("HONEYCOMB_WRITE_KEY is required")?;
        let dataset =
            std::env::var("HONEYCOMB_DATASET").context("HONEYCOMB_DATASET is required")?;

        let mut config = Self::new(write_key, dataset);

        if let Ok(api_host) = std::env::var("HONEYCOMB_API_HOST") {
            config.api_host = api_host;
        }
        config.proxy = std::env::var("HONEYCOMB_PROXY").ok();
        config.sample_rate = std::env::var("HONEYCOMB_SAMPLE_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        config.batch_size_trigger = std::env::var("HONEYCOMB_BATCH_SIZE_TRIGGER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BATCH_SIZE_TRIGGER);
        config.batch_time_trigger_ms = std::env::var("HONEYCOMB_BATCH_TIME_TRIGGER_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BATCH_TIME_TRIGGER_MS);
        config.max_concurrent_batches = std::env::var("HONEYCOMB_MAX_CONCURRENT_BATCHES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONCURRENT_BATCHES);
        config.pending_work_capacity = std::env::var("HONEYCOMB_PENDING_WORK_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PENDING_WORK_CAPACITY);
        config.max_response_queue_size = std::env::var("HONEYCOMB_MAX_RESPONSE_QUEUE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_RESPONSE_QUEUE_SIZE);
        config.disabled = std::env::var("HONEYCOMB_DISABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.write_key.is_empty() {
            anyhow::bail!("write_key must not be empty");
        }
        if self.dataset.is_empty() {
            anyhow::bail!("dataset must not be empty");
        }
        if self.api_host.is_empty() {
            anyhow::bail!("api_host must not be empty");
        }
        if self.sample_rate == 0 {
            anyhow::bail!("sample_rate must be at least 1 (1 = no sampling)");
        }
        Ok(())
    }
}
