use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::errors::{AppError, AppResult};

/// Environment variable holding the TMDb API credential
pub const TMDB_API_KEY_ENV: &str = "TMDB_API_KEY";

/// Environment variable naming the configuration file
pub const CONFIG_FILE: &str = "CONFIG_FILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

/// Outbound request pacing and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Minimum spacing between two dispatched requests
    #[serde(with = "duration_serde", default = "default_min_interval")]
    pub min_interval: Duration,
    /// Retries granted to a throttled (429) request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `base * 2^n`
    #[serde(with = "duration_serde", default = "default_retry_base_delay")]
    pub retry_base_delay: Duration,
    /// Random extra backoff as a percentage of the computed delay
    #[serde(default)]
    pub retry_jitter_percent: u8,
    /// Per-request timeout
    #[serde(with = "duration_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(with = "duration_serde", default = "default_cache_ttl")]
    pub ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Items requested per search call
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Ranked candidates handed to the stream fetcher
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Detail lookups allowed in flight at once
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// TMDb credential; TMDb is skipped entirely when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_api_key: Option<String>,
    #[serde(default = "default_tmdb_language")]
    pub tmdb_language: String,
    #[serde(default = "default_wikidata_language")]
    pub wikidata_language: String,
    /// Ask TMDb for alternative titles when building title variations
    #[serde(default = "default_true")]
    pub use_alternative_titles: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Requesters allowed to run the pipeline at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Requesters without activity for this long are purged
    #[serde(with = "duration_serde", default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    /// Debounce before promoting the queue head after a release
    #[serde(with = "duration_serde", default = "default_promotion_delay")]
    pub promotion_delay: Duration,
    /// Per-position estimate used for ETA feedback
    #[serde(with = "duration_serde", default = "default_estimated_request_duration")]
    pub estimated_request_duration: Duration,
    /// How long a queued requester waits for its turn before giving up
    #[serde(with = "duration_serde", default = "default_max_wait")]
    pub max_wait: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Overall time limit for one resolution
    #[serde(with = "duration_serde", default = "default_resolve_timeout")]
    pub resolve_timeout: Duration,
    /// Prefix shown in each stream's display name
    #[serde(default = "default_addon_name")]
    pub addon_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
    #[serde(default = "default_tmdb_base_url")]
    pub tmdb_base_url: String,
    #[serde(default = "default_wikidata_endpoint")]
    pub wikidata_endpoint: String,
}

fn default_min_interval() -> Duration {
    Duration::from_millis(DEFAULT_MIN_INTERVAL_MS)
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_base_delay() -> Duration {
    Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS)
}
fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_cache_ttl() -> Duration {
    Duration::from_secs(DEFAULT_CACHE_TTL_SECS)
}
fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}
fn default_max_candidates() -> usize {
    DEFAULT_MAX_CANDIDATES
}
fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}
fn default_tmdb_language() -> String {
    DEFAULT_TMDB_LANGUAGE.to_string()
}
fn default_wikidata_language() -> String {
    DEFAULT_WIKIDATA_LANGUAGE.to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}
fn default_idle_timeout() -> Duration {
    Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)
}
fn default_promotion_delay() -> Duration {
    Duration::from_millis(DEFAULT_PROMOTION_DELAY_MS)
}
fn default_estimated_request_duration() -> Duration {
    Duration::from_secs(DEFAULT_ESTIMATED_REQUEST_SECS)
}
fn default_max_wait() -> Duration {
    Duration::from_secs(DEFAULT_MAX_WAIT_SECS)
}
fn default_resolve_timeout() -> Duration {
    Duration::from_secs(DEFAULT_RESOLVE_TIMEOUT_SECS)
}
fn default_addon_name() -> String {
    DEFAULT_ADDON_NAME.to_string()
}
fn default_search_base_url() -> String {
    DEFAULT_SEARCH_BASE_URL.to_string()
}
fn default_tmdb_base_url() -> String {
    DEFAULT_TMDB_BASE_URL.to_string()
}
fn default_wikidata_endpoint() -> String {
    DEFAULT_WIKIDATA_ENDPOINT.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            min_interval: default_min_interval(),
            max_retries: default_max_retries(),
            retry_base_delay: default_retry_base_delay(),
            retry_jitter_percent: 0,
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            max_candidates: default_max_candidates(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_language: default_tmdb_language(),
            wikidata_language: default_wikidata_language(),
            use_alternative_titles: true,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            idle_timeout: default_idle_timeout(),
            promotion_delay: default_promotion_delay(),
            estimated_request_duration: default_estimated_request_duration(),
            max_wait: default_max_wait(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: default_resolve_timeout(),
            addon_name: default_addon_name(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            search_base_url: default_search_base_url(),
            tmdb_base_url: default_tmdb_base_url(),
            wikidata_endpoint: default_wikidata_endpoint(),
        }
    }
}

impl MetadataConfig {
    /// The TMDb credential, ignoring blank values
    pub fn tmdb_key(&self) -> Option<&str> {
        self.tmdb_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// First four characters of the credential followed by `*` for the rest
    pub fn masked_tmdb_key(&self) -> Option<String> {
        self.tmdb_key().map(|key| {
            let visible: String = key.chars().take(4).collect();
            let hidden = key.chars().count().saturating_sub(4);
            format!("{visible}{}", "*".repeat(hidden))
        })
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var(CONFIG_FILE).unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` so tests need not touch
    /// the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(TMDB_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.metadata.tmdb_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.queue.max_concurrent == 0 {
            return Err(AppError::configuration(
                "queue.max_concurrent must be at least 1",
            ));
        }
        if self.search.max_candidates == 0 {
            return Err(AppError::configuration(
                "search.max_candidates must be at least 1",
            ));
        }
        if self.gateway.retry_jitter_percent > 100 {
            return Err(AppError::configuration(
                "gateway.retry_jitter_percent must be between 0 and 100",
            ));
        }
        if self.search.fetch_concurrency == 0 {
            return Err(AppError::configuration(
                "search.fetch_concurrency must be at least 1",
            ));
        }
        Ok(())
    }
}
