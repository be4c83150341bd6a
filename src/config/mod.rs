//! Configuration for siterecon

mod crawl;
mod dedup;
mod fuzzer;
mod logging;
mod output;
mod passive;
mod scope;

pub use crawl::CrawlConfig;
pub use dedup::DedupConfig;
pub use fuzzer::FuzzerConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use output::{OutputConfig, SinkFormat};
pub use passive::{ArchiveProvider, PassiveConfig};
pub use scope::{ScopeConfig, ScopeMode};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for all HTTP requests (crawling, passive sources)
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; siterecon/0.1; +https://github.com/siterecon)";

/// Main configuration for a crawl
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Crawl engine configuration
    #[serde(default)]
    pub crawl: CrawlConfig,
    /// Scope engine configuration
    #[serde(default)]
    pub scope: ScopeConfig,
    /// Deduplication configuration
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Output and checkpoint configuration
    #[serde(default)]
    pub output: OutputConfig,
    /// Passive source configuration
    #[serde(default)]
    pub passive: PassiveConfig,
    /// Pattern fuzzer configuration
    #[serde(default)]
    pub fuzzer: FuzzerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass rather than playing whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Crawl validation
        if self.crawl.rate_limit <= 0.0 {
            errors.push("rate_limit must be positive".to_string());
        }
        if self.crawl.effective_workers() == 0 || self.crawl.effective_workers() > 500 {
            errors.push("workers must be between 1 and 500".to_string());
        }
        if self.crawl.base_timeout_secs == 0 {
            errors.push("base_timeout_secs must be positive".to_string());
        }
        if self.crawl.max_timeout_secs < self.crawl.base_timeout_secs {
            errors.push("max_timeout_secs must be >= base_timeout_secs".to_string());
        }
        if self.crawl.retry_multiplier < 1.0 {
            errors.push("retry_multiplier must be >= 1.0".to_string());
        }
        if self.crawl.max_urls == 0 {
            errors.push("max_urls must be positive".to_string());
        }
        if self.crawl.learning_rate <= 0.0 || self.crawl.learning_rate >= 1.0 {
            errors.push("learning_rate must be between 0.0 and 1.0 (exclusive)".to_string());
        }
        if self.crawl.cookie.is_some() && self.crawl.cookie_file.is_some() {
            errors.push("cookie and cookie_file are mutually exclusive".to_string());
        }

        // Scope validation: blacklist regexes must compile
        for pattern in &self.scope.blacklist_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(format!("invalid blacklist pattern '{}': {}", pattern, e));
            }
        }

        // Dedup validation
        if self.dedup.embedding_dim == 0 {
            errors.push("embedding_dim must be positive".to_string());
        }
        if self.dedup.similarity_threshold < 0.0 || self.dedup.similarity_threshold > 1.0 {
            errors.push("similarity_threshold must be between 0.0 and 1.0".to_string());
        }
        if self.dedup.bloom_false_positive_rate <= 0.0
            || self.dedup.bloom_false_positive_rate >= 1.0
        {
            errors.push(
                "bloom_false_positive_rate must be between 0.0 (exclusive) and 1.0 (exclusive)"
                    .to_string(),
            );
        }
        if self.dedup.expected_urls == 0 {
            errors.push("expected_urls must be positive".to_string());
        }

        // Output validation
        if self.output.out_dir.as_os_str().is_empty() {
            errors.push("out_dir must not be empty".to_string());
        }
        if self.output.formats.is_empty() {
            errors.push("at least one output format must be enabled".to_string());
        }
        if self.output.flush_every == 0 {
            errors.push("flush_every must be positive".to_string());
        }
        if self.output.checkpoint_interval_secs == 0 {
            errors.push("checkpoint_interval_secs must be positive".to_string());
        }
        if self.output.sink_queue_capacity == 0 {
            errors.push("sink_queue_capacity must be positive".to_string());
        }

        // Passive validation
        if self
            .passive
            .archives
            .contains(&ArchiveProvider::VirusTotal)
            && self.passive.virustotal_api_key.is_none()
        {
            errors.push("virustotal archive source requires virustotal_api_key".to_string());
        }

        // Fuzzer validation
        if self.fuzzer.enabled {
            if self.fuzzer.params.is_empty() {
                errors.push("fuzzer params must not be empty when the fuzzer is enabled".to_string());
            }
            if self.fuzzer.values.is_empty() {
                errors.push("fuzzer values must not be empty when the fuzzer is enabled".to_string());
            }
        }
        if self.fuzzer.identical_threshold <= 0.0 || self.fuzzer.identical_threshold > 1.0 {
            errors.push("identical_threshold must be between 0.0 (exclusive) and 1.0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
