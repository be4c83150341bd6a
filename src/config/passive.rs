//! Passive source configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External archive providers usable as seed sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveProvider {
    Wayback,
    CommonCrawl,
    VirusTotal,
}

/// Passive source ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassiveConfig {
    /// Fetch and parse {target}/robots.txt for seeds
    #[serde(default = "default_true")]
    pub robots: bool,
    /// Honor robots.txt disallow rules during the crawl
    #[serde(default)]
    pub honor_robots_disallow: bool,
    /// Fetch and parse sitemaps (sitemap.xml plus robots directives)
    #[serde(default = "default_true")]
    pub sitemap: bool,
    /// Archive providers queried for historical URLs
    #[serde(default)]
    pub archives: Vec<ArchiveProvider>,
    /// API key for the VirusTotal provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virustotal_api_key: Option<String>,
    /// Burp Suite XML export to ingest as seeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burp_file: Option<PathBuf>,
    /// HAR 1.2 capture to ingest as seeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub har_file: Option<PathBuf>,
    /// Cap on seed URLs taken from any single passive source
    #[serde(default = "default_max_seed_urls")]
    pub max_seed_urls: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_seed_urls() -> usize {
    10_000
}

impl Default for PassiveConfig {
    fn default() -> Self {
        Self {
            robots: true,
            honor_robots_disallow: false,
            sitemap: true,
            archives: Vec::new(),
            virustotal_api_key: None,
            burp_file: None,
            har_file: None,
            max_seed_urls: default_max_seed_urls(),
        }
    }
}
