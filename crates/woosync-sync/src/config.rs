//! # Worker Configuration
//!
//! Configuration management for the sync worker.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     WOOSYNC_DATABASE_PATH=/var/lib/woosync/woosync.db                  │
//! │     WOOSYNC_REDIS_URL=redis://127.0.0.1/                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/woosync/worker.toml (Linux)                              │
//! │     ~/Library/Application Support/com.woosync.worker/worker.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! test_mode = false
//!
//! [database]
//! path = "/var/lib/woosync/woosync.db"
//!
//! [http]
//! timeout_secs = 40
//! verify_ssl = true
//!
//! [stock]
//! per_item_timeout_secs = 10
//! min_job_timeout_secs = 300
//!
//! [price]
//! batch_size = 50
//! lock_ttl_secs = 14400
//! manual_debounce_secs = 1800
//!
//! [cache]
//! redis_url = "redis://127.0.0.1/"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the ERP mirror lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "woosync", "worker")
        .map(|dirs| dirs.data_dir().join("woosync.db"))
        .unwrap_or_else(|| PathBuf::from("woosync.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// HTTP Settings
// =============================================================================

/// WooCommerce REST client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout (seconds).
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Verify TLS certificates. Only switch off against a development store.
    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    /// REST API namespace under `/wp-json/`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Record every request in `woocommerce_request_log`.
    #[serde(default = "default_true")]
    pub log_requests: bool,
}

fn default_http_timeout() -> u64 {
    40
}

fn default_api_version() -> String {
    "wc/v3".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout_secs: default_http_timeout(),
            verify_ssl: true,
            api_version: default_api_version(),
            log_requests: true,
        }
    }
}

impl HttpSettings {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Queue Settings
// =============================================================================

/// Worker counts of the three named queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default = "default_short_workers")]
    pub short_workers: usize,

    #[serde(default = "default_default_workers")]
    pub default_workers: usize,

    #[serde(default = "default_long_workers")]
    pub long_workers: usize,

    /// Timeout for jobs enqueued without one (seconds).
    #[serde(default = "default_job_timeout")]
    pub default_job_timeout_secs: u64,
}

fn default_short_workers() -> usize {
    2
}

fn default_default_workers() -> usize {
    2
}

fn default_long_workers() -> usize {
    1
}

fn default_job_timeout() -> u64 {
    300
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            short_workers: default_short_workers(),
            default_workers: default_default_workers(),
            long_workers: default_long_workers(),
            default_job_timeout_secs: default_job_timeout(),
        }
    }
}

// =============================================================================
// Stock Settings
// =============================================================================

/// Stock sync sizing.
///
/// A batched stock job does one PUT per linked server per item, so its
/// timeout grows with the batch:
/// `max(min_job_timeout_secs, items × per_item_timeout_secs)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSettings {
    /// Items read per page during the full sweep.
    #[serde(default = "default_sweep_page_size")]
    pub sweep_page_size: u32,

    /// Item codes carried by one sweep job.
    #[serde(default = "default_sweep_job_batch_size")]
    pub sweep_job_batch_size: usize,

    /// Worst-case time budget per item (seconds).
    #[serde(default = "default_per_item_timeout")]
    pub per_item_timeout_secs: u64,

    /// Floor for every stock job timeout (seconds).
    #[serde(default = "default_min_stock_job_timeout")]
    pub min_job_timeout_secs: u64,

    /// Debounce window of the manual stock trigger (seconds).
    #[serde(default = "default_stock_debounce")]
    pub manual_debounce_secs: u64,
}

fn default_sweep_page_size() -> u32 {
    woosync_core::ITEM_PAGE_SIZE
}

fn default_sweep_job_batch_size() -> usize {
    50
}

fn default_per_item_timeout() -> u64 {
    // One PUT per server at the 40 s request timeout, two servers typical.
    80
}

fn default_min_stock_job_timeout() -> u64 {
    300
}

fn default_stock_debounce() -> u64 {
    300
}

impl Default for StockSettings {
    fn default() -> Self {
        StockSettings {
            sweep_page_size: default_sweep_page_size(),
            sweep_job_batch_size: default_sweep_job_batch_size(),
            per_item_timeout_secs: default_per_item_timeout(),
            min_job_timeout_secs: default_min_stock_job_timeout(),
            manual_debounce_secs: default_stock_debounce(),
        }
    }
}

impl StockSettings {
    /// Timeout for a stock job carrying `item_count` items.
    pub fn job_timeout(&self, item_count: usize) -> Duration {
        let scaled = self.per_item_timeout_secs.saturating_mul(item_count as u64);
        Duration::from_secs(scaled.max(self.min_job_timeout_secs))
    }
}

// =============================================================================
// Price Settings
// =============================================================================

/// Price sync sizing and cache TTLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSettings {
    /// Eligible rows per `SyncItemPriceBatch` job.
    #[serde(default = "default_price_batch_size")]
    pub batch_size: usize,

    /// TTL of the full-catalog price lock (seconds).
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Debounce window of the manual price trigger (seconds).
    #[serde(default = "default_price_debounce")]
    pub manual_debounce_secs: u64,

    /// Timeout of price planning jobs, and the floor for batch jobs (seconds).
    #[serde(default = "default_price_job_timeout")]
    pub job_timeout_secs: u64,
}

fn default_price_batch_size() -> usize {
    50
}

fn default_lock_ttl() -> u64 {
    4 * 60 * 60
}

fn default_price_debounce() -> u64 {
    30 * 60
}

fn default_price_job_timeout() -> u64 {
    900
}

impl Default for PriceSettings {
    fn default() -> Self {
        PriceSettings {
            batch_size: default_price_batch_size(),
            lock_ttl_secs: default_lock_ttl(),
            manual_debounce_secs: default_price_debounce(),
            job_timeout_secs: default_price_job_timeout(),
        }
    }
}

impl PriceSettings {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

// =============================================================================
// Scheduler Settings
// =============================================================================

/// Intervals of the periodic tasks. Zero disables a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Full stock sweep (seconds). Default: daily.
    #[serde(default = "default_daily")]
    pub stock_sweep_interval_secs: u64,

    /// Full-catalog price pass (seconds). Default: daily.
    #[serde(default = "default_daily")]
    pub price_sync_interval_secs: u64,

    /// Request log cleanup (seconds). Default: daily.
    #[serde(default = "default_daily")]
    pub request_log_cleanup_interval_secs: u64,
}

fn default_daily() -> u64 {
    24 * 60 * 60
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            stock_sweep_interval_secs: default_daily(),
            price_sync_interval_secs: default_daily(),
            request_log_cleanup_interval_secs: default_daily(),
        }
    }
}

// =============================================================================
// Cache / Server / Request Log Settings
// =============================================================================

/// Cache backend. Without a Redis URL the worker keeps keys in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Hook surface listen address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Request log retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogSettings {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    7
}

impl Default for RequestLogSettings {
    fn default() -> Self {
        RequestLogSettings {
            retention_days: default_retention_days(),
        }
    }
}

// =============================================================================
// Main Worker Configuration
// =============================================================================

/// Complete worker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Suppresses every hook-triggered enqueue.
    #[serde(default)]
    pub test_mode: bool,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub stock: StockSettings,

    #[serde(default)]
    pub price: PriceSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub request_log: RequestLogSettings,
}

impl WorkerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (worker.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading worker config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Timeout of a price batch of `rows` rows with `delay` between rows.
    ///
    /// Every row may spend a GET and a PUT at the request timeout plus the
    /// pause: `max(price.job_timeout_secs, rows × (delay + 2 × http.timeout_secs))`.
    pub fn price_batch_timeout(&self, rows: usize, delay: Duration) -> Duration {
        let per_row = delay.saturating_add(Duration::from_secs(self.http.timeout_secs.saturating_mul(2)));
        let rows = u32::try_from(rows).unwrap_or(u32::MAX);
        per_row.saturating_mul(rows).max(self.price.job_timeout())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.http.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "http.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.http.api_version.trim().is_empty() {
            return Err(SyncError::InvalidConfig("http.api_version is empty".into()));
        }

        if self.queue.short_workers == 0
            || self.queue.default_workers == 0
            || self.queue.long_workers == 0
        {
            return Err(SyncError::InvalidConfig(
                "every queue needs at least one worker".into(),
            ));
        }

        if self.price.batch_size == 0 || self.stock.sweep_job_batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch sizes must be greater than 0".into(),
            ));
        }

        if self.stock.sweep_page_size == 0 {
            return Err(SyncError::InvalidConfig(
                "stock.sweep_page_size must be greater than 0".into(),
            ));
        }

        if let Some(ref url) = self.cache.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(SyncError::InvalidUrl(format!(
                    "Redis URL must start with redis:// or rediss://, got: {}",
                    url
                )));
            }
        }

        if self.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(SyncError::InvalidConfig(format!(
                "server.listen_addr is not a socket address: {}",
                self.server.listen_addr
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("WOOSYNC_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("WOOSYNC_REDIS_URL") {
            debug!("Overriding Redis URL from environment");
            self.cache.redis_url = Some(url).filter(|u| !u.is_empty());
        }

        if let Ok(addr) = std::env::var("WOOSYNC_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }

        if let Ok(timeout) = std::env::var("WOOSYNC_HTTP_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse::<u64>() {
                self.http.timeout_secs = t;
            }
        }

        if let Ok(verify) = std::env::var("WOOSYNC_VERIFY_SSL") {
            match verify.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.http.verify_ssl = true,
                "0" | "false" | "no" => self.http.verify_ssl = false,
                _ => warn!(value = %verify, "Unknown WOOSYNC_VERIFY_SSL value"),
            }
        }

        if let Ok(test_mode) = std::env::var("WOOSYNC_TEST_MODE") {
            self.test_mode = matches!(test_mode.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "woosync", "worker")
            .map(|dirs| dirs.config_dir().join("worker.toml"))
    }
}
