use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Ticket data configuration
    pub data: DataConfig,

    /// Full-text search configuration
    pub search: SearchSettings,

    /// Bulk ingestion configuration
    #[serde(default)]
    pub ingest: IngestSettings,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/rt-archive.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: RT_ARCHIVE__)
            .add_source(
                config::Environment::with_prefix("RT_ARCHIVE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse the configured snapshot time, if any
    pub fn snapshot_time(&self) -> Result<Option<chrono::NaiveDateTime>, config::ConfigError> {
        match self.server.snapshot_time.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => chrono::NaiveDateTime::parse_from_str(raw, SNAPSHOT_FORMAT)
                .map(Some)
                .map_err(|e| {
                    config::ConfigError::Message(format!(
                        "snapshot_time {raw:?} is not {SNAPSHOT_FORMAT}: {e}"
                    ))
                }),
        }
    }
}

/// Format of `server.snapshot_time`, e.g. `2019-11-20T17:05`
pub const SNAPSHOT_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// URL prefix every archive route is mounted under
    #[serde(default)]
    pub prefix: String,

    /// Site title
    #[serde(default = "default_site")]
    pub site: String,

    /// Short name of the site
    #[serde(default)]
    pub short_site: String,

    /// Prefix of GitHub issue links (https://github.com/org/repo)
    #[serde(default)]
    pub github_prefix: String,

    /// When the data archive was created
    #[serde(default)]
    pub snapshot_time: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of ticket documents, or a single `.zip` archive
    pub path: PathBuf,

    /// Number of parsed tickets kept in memory (0 disables the cache)
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Path to the full-text index directory, or a `.zip` containing it
    pub index_path: PathBuf,

    /// Index writer heap size in bytes
    #[serde(default = "default_writer_heap_size")]
    pub writer_heap_size: usize,

    /// Page size used when none (or an out-of-range one) is requested
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Largest page size a request may ask for
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    /// Deadline for a single search (seconds)
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,

    /// How many times to look for the index before giving up
    #[serde(default = "default_wait_retries")]
    pub wait_retries: u32,

    /// Pause between looks for the index (seconds)
    #[serde(default = "default_wait_interval")]
    pub wait_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Where the exported `<id>.json` documents live
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Where `index.json` and the full-text index are written
    #[serde(default = "default_data_path")]
    pub out_dir: PathBuf,

    /// Directory name of the full-text index inside `out_dir`
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Full-text indexing batch size
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of ticket files read at once
    #[serde(default = "default_parallel_reads")]
    pub parallel_reads: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            out_dir: default_data_path(),
            index_name: default_index_name(),
            batch_size: default_batch_size(),
            parallel_reads: default_parallel_reads(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_site() -> String {
    "RT Archive".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_cache_size() -> u64 {
    256
}

fn default_writer_heap_size() -> usize {
    50_000_000
}

fn default_page_size() -> u64 {
    25
}

fn default_max_page_size() -> u64 {
    100
}

fn default_search_timeout() -> u64 {
    8
}

fn default_wait_retries() -> u32 {
    10
}

fn default_wait_interval() -> u64 {
    30
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./out")
}

fn default_index_name() -> String {
    "index.tantivy".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_parallel_reads() -> usize {
    16
}

fn default_log_level() -> String {
    "info".to_string()
}
