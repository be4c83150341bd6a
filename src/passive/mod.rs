//! Passive source ingestion
//!
//! Seeds the frontier before the first fetch of the main loop:
//! robots.txt paths and sitemap directives, sitemap.xml (including
//! nested indexes), historical archives, and captured traffic (Burp
//! XML, HAR). Every source failure is non-fatal; the crawl proceeds
//! with whatever seeds were gathered.

mod archive;
mod burp;
mod har;
mod robots;
mod sitemap;

pub use archive::{
    ArchiveSource, CommonCrawlSource, VirusTotalSource, WaybackSource,
};
pub use burp::{parse_burp_file, parse_burp_xml, BurpItem};
pub use har::{parse_har_file, parse_har_json, HarRequest};
pub use robots::RobotsRules;
pub use sitemap::{parse_sitemap, SitemapDocument};

use crate::config::{ArchiveProvider, PassiveConfig};
use crate::types::DiscoverySource;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Ceiling on sitemap files followed per crawl, indexes included.
const MAX_SITEMAP_FILES: usize = 50;

#[derive(Debug, Error)]
pub enum PassiveError {
    #[error("passive source fetch failed: {0}")]
    Fetch(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Seeds gathered from all enabled passive sources.
#[derive(Debug, Default)]
pub struct SeedBatch {
    /// Raw URLs with the source that produced them, ready for the
    /// harvester.
    pub seeds: Vec<(String, DiscoverySource)>,
    /// Parsed robots rules, kept when disallow rules are honored.
    pub robots: Option<RobotsRules>,
}

/// Gathers seeds from robots, sitemaps, archives and captured traffic.
pub struct PassiveIngestor {
    config: PassiveConfig,
    client: reqwest::Client,
    user_agent: String,
}

impl PassiveIngestor {
    pub fn new(config: PassiveConfig, user_agent: &str) -> Result<Self, PassiveError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(20))
            .gzip(true)
            .build()
            .map_err(|e| PassiveError::Fetch(e.to_string()))?;
        Ok(Self {
            config,
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// Run every enabled source against the target.
    pub async fn collect(&self, target: &Url) -> SeedBatch {
        let mut batch = SeedBatch::default();
        let origin = origin_of(target);
        let host = target.host_str().unwrap_or_default().to_string();

        let mut sitemap_urls: VecDeque<String> = VecDeque::new();
        if self.config.sitemap {
            sitemap_urls.push_back(format!("{origin}/sitemap.xml"));
        }

        if self.config.robots {
            match self.fetch_text(&format!("{origin}/robots.txt")).await {
                Ok(content) => {
                    let rules = RobotsRules::parse(&content, &self.user_agent);
                    for path in rules.seed_paths() {
                        batch
                            .seeds
                            .push((format!("{origin}{path}"), DiscoverySource::Robots));
                    }
                    if self.config.sitemap {
                        for sitemap in rules.sitemaps() {
                            sitemap_urls.push_back(sitemap.clone());
                        }
                    }
                    batch.robots = Some(rules);
                }
                Err(e) => warn!(error = %e, "robots.txt unavailable"),
            }
        }

        if self.config.sitemap {
            let urls = self.walk_sitemaps(sitemap_urls).await;
            batch
                .seeds
                .extend(urls.into_iter().map(|u| (u, DiscoverySource::Sitemap)));
        }

        for provider in &self.config.archives {
            match self.archive_source(*provider) {
                Ok(source) => match source.seed_urls(&host, self.config.max_seed_urls).await {
                    Ok(urls) => {
                        info!(source = source.name(), count = urls.len(), "archive seeds");
                        batch.seeds.extend(
                            urls.into_iter()
                                .take(self.config.max_seed_urls)
                                .map(|u| (u, DiscoverySource::Archive)),
                        );
                    }
                    Err(e) => warn!(source = source.name(), error = %e, "archive source failed"),
                },
                Err(e) => warn!(provider = ?provider, error = %e, "archive source unavailable"),
            }
        }

        if let Some(path) = &self.config.burp_file {
            match parse_burp_file(path) {
                Ok(items) => {
                    info!(count = items.len(), "burp import seeds");
                    batch.seeds.extend(
                        items
                            .into_iter()
                            .take(self.config.max_seed_urls)
                            .map(|item| (item.url, DiscoverySource::BurpImport)),
                    );
                }
                Err(e) => warn!(path = %path.display(), error = %e, "burp import failed"),
            }
        }

        if let Some(path) = &self.config.har_file {
            match parse_har_file(path) {
                Ok(requests) => {
                    info!(count = requests.len(), "har import seeds");
                    batch.seeds.extend(
                        requests
                            .into_iter()
                            .take(self.config.max_seed_urls)
                            .map(|request| (request.url, DiscoverySource::HarImport)),
                    );
                }
                Err(e) => warn!(path = %path.display(), error = %e, "har import failed"),
            }
        }

        debug!(seeds = batch.seeds.len(), "passive collection done");
        batch
    }

    fn archive_source(
        &self,
        provider: ArchiveProvider,
    ) -> Result<Box<dyn ArchiveSource>, PassiveError> {
        match provider {
            ArchiveProvider::Wayback => Ok(Box::new(WaybackSource::new(&self.user_agent)?)),
            ArchiveProvider::CommonCrawl => {
                Ok(Box::new(CommonCrawlSource::new(&self.user_agent)?))
            }
            ArchiveProvider::VirusTotal => {
                let key = self
                    .config
                    .virustotal_api_key
                    .clone()
                    .ok_or_else(|| PassiveError::Fetch("virustotal api key missing".into()))?;
                Ok(Box::new(VirusTotalSource::new(&self.user_agent, key)?))
            }
        }
    }

    /// Breadth-first walk over sitemap files, following index nesting
    /// up to the file ceiling and the per-source URL cap.
    async fn walk_sitemaps(&self, mut queue: VecDeque<String>) -> Vec<String> {
        let mut urls = Vec::new();
        let mut fetched = 0usize;
        let mut seen: Vec<String> = Vec::new();

        while let Some(sitemap_url) = queue.pop_front() {
            if fetched >= MAX_SITEMAP_FILES || urls.len() >= self.config.max_seed_urls {
                break;
            }
            if seen.contains(&sitemap_url) {
                continue;
            }
            seen.push(sitemap_url.clone());
            fetched += 1;

            let body = match self.fetch_text(&sitemap_url).await {
                Ok(body) => body,
                Err(e) => {
                    debug!(url = %sitemap_url, error = %e, "sitemap unavailable");
                    continue;
                }
            };
            match parse_sitemap(&body) {
                Ok(document) => {
                    let room = self.config.max_seed_urls - urls.len();
                    urls.extend(document.urls.into_iter().take(room));
                    queue.extend(document.nested);
                }
                Err(e) => warn!(url = %sitemap_url, error = %e, "sitemap parse failed"),
            }
        }
        urls
    }

    async fn fetch_text(&self, url: &str) -> Result<String, PassiveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PassiveError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PassiveError::Fetch(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| PassiveError::Fetch(e.to_string()))
    }
}

fn origin_of(url: &Url) -> String {
    let mut origin = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{port}"));
    }
    origin
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_origin_of() {
        let url = Url::parse("https://example.com/a/b?c=1").unwrap();
        assert_eq!(origin_of(&url), "https://example.com");
        let url = Url::parse("http://example.com:8080/").unwrap();
        assert_eq!(origin_of(&url), "http://example.com:8080");
    }

    #[tokio::test]
    async fn test_burp_and_har_files_collected() {
        let mut burp = NamedTempFile::new().unwrap();
        write!(
            burp,
            "<items><item><url>https://example.com/from-burp</url><method>GET</method></item></items>"
        )
        .unwrap();
        let mut har = NamedTempFile::new().unwrap();
        write!(
            har,
            r#"{{"log": {{"entries": [{{"request": {{"method": "GET", "url": "https://example.com/from-har"}}}}]}}}}"#
        )
        .unwrap();

        let config = PassiveConfig {
            robots: false,
            sitemap: false,
            burp_file: Some(burp.path().to_path_buf()),
            har_file: Some(har.path().to_path_buf()),
            ..Default::default()
        };
        let ingestor = PassiveIngestor::new(config, "siterecon-test").unwrap();
        let batch = ingestor
            .collect(&Url::parse("https://example.com/").unwrap())
            .await;

        let urls: Vec<&str> = batch.seeds.iter().map(|(u, _)| u.as_str()).collect();
        assert!(urls.contains(&"https://example.com/from-burp"));
        assert!(urls.contains(&"https://example.com/from-har"));
        assert!(batch
            .seeds
            .iter()
            .any(|(_, s)| *s == DiscoverySource::BurpImport));
    }

    #[tokio::test]
    async fn test_missing_capture_files_nonfatal() {
        let config = PassiveConfig {
            robots: false,
            sitemap: false,
            burp_file: Some("/nonexistent/burp.xml".into()),
            har_file: Some("/nonexistent/capture.har".into()),
            ..Default::default()
        };
        let ingestor = PassiveIngestor::new(config, "siterecon-test").unwrap();
        let batch = ingestor
            .collect(&Url::parse("https://example.com/").unwrap())
            .await;
        assert!(batch.seeds.is_empty());
    }
}
