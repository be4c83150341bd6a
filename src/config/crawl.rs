//! Crawl engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Core crawl configuration: depth, workers, rate limit, timeouts,
/// retries, and resource ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum crawl depth from the seed URL
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Worker count; 0 selects automatically from max_depth
    #[serde(default)]
    pub workers: usize,
    /// Global request rate in requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,
    /// Token bucket burst size; 0 selects max(rate/10, 1)
    #[serde(default)]
    pub burst: usize,
    /// Base per-request timeout in seconds
    #[serde(default = "default_base_timeout_secs")]
    pub base_timeout_secs: u64,
    /// Upper bound for the adaptive per-request timeout
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
    /// Maximum retries for retryable fetch errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base retry delay in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Retry delay multiplier per attempt
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
    /// Global cap on enqueued URLs
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
    /// Optional wall-clock deadline for the whole crawl, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Cookie header value sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    /// File containing the cookie header value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_file: Option<PathBuf>,
    /// Body size ceiling for HTML responses, in bytes
    #[serde(default = "default_max_body_html")]
    pub max_body_bytes_html: usize,
    /// Body size ceiling for JS/CSS responses, in bytes
    #[serde(default = "default_max_body_js")]
    pub max_body_bytes_js: usize,
    /// Soft memory ceiling for the whole process, in megabytes
    #[serde(default = "default_memory_soft_cap_mb")]
    pub memory_soft_cap_mb: usize,
    /// Whether the adaptive learner retunes frontier weights
    #[serde(default = "default_true")]
    pub adaptive_learning: bool,
    /// Learner step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_max_depth() -> usize {
    2
}

fn default_rate_limit() -> f64 {
    20.0
}

fn default_base_timeout_secs() -> u64 {
    10
}

fn default_max_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_max_urls() -> usize {
    10_000
}

fn default_user_agent() -> String {
    crate::config::DEFAULT_USER_AGENT.to_string()
}

fn default_max_body_html() -> usize {
    10 * 1024 * 1024
}

fn default_max_body_js() -> usize {
    5 * 1024 * 1024
}

fn default_memory_soft_cap_mb() -> usize {
    500
}

fn default_true() -> bool {
    true
}

fn default_learning_rate() -> f64 {
    0.15
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            workers: 0,
            rate_limit: default_rate_limit(),
            burst: 0,
            base_timeout_secs: default_base_timeout_secs(),
            max_timeout_secs: default_max_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
            max_urls: default_max_urls(),
            deadline_secs: None,
            user_agent: default_user_agent(),
            cookie: None,
            cookie_file: None,
            max_body_bytes_html: default_max_body_html(),
            max_body_bytes_js: default_max_body_js(),
            memory_soft_cap_mb: default_memory_soft_cap_mb(),
            adaptive_learning: true,
            learning_rate: default_learning_rate(),
        }
    }
}

impl CrawlConfig {
    /// Worker count after applying the auto-selection rule: deeper
    /// crawls fan out more, so they get a larger pool.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else if self.max_depth > 2 {
            30
        } else {
            20
        }
    }

    /// Burst size after applying the auto-selection rule.
    pub fn effective_burst(&self) -> usize {
        if self.burst > 0 {
            self.burst
        } else {
            ((self.rate_limit / 10.0) as usize).max(1)
        }
    }
}
