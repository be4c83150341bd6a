//! Historical archive seed sources
//!
//! Wayback Machine CDX, CommonCrawl index and VirusTotal behind one
//! trait. Each source fetches a URL list for the target host; any
//! failure is reported to the caller, which treats it as non-fatal.

use super::PassiveError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// CommonCrawl index collection queried for historical URLs.
const COMMONCRAWL_INDEX: &str = "CC-MAIN-2024-33";

/// A provider of historical URLs for a host.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn seed_urls(&self, host: &str, limit: usize) -> Result<Vec<String>, PassiveError>;
}

fn archive_client(user_agent: &str) -> Result<reqwest::Client, PassiveError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .gzip(true)
        .build()
        .map_err(|e| PassiveError::Fetch(e.to_string()))
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, PassiveError> {
    let response = client
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

/// Wayback Machine CDX API.
pub struct WaybackSource {
    client: reqwest::Client,
}

impl WaybackSource {
    pub fn new(user_agent: &str) -> Result<Self, PassiveError> {
        Ok(Self {
            client: archive_client(user_agent)?,
        })
    }
}

#[async_trait]
impl ArchiveSource for WaybackSource {
    fn name(&self) -> &'static str {
        "wayback"
    }

    async fn seed_urls(&self, host: &str, limit: usize) -> Result<Vec<String>, PassiveError> {
        let url = format!(
            "https://web.archive.org/cdx/search/cdx?url={host}/*&output=json&fl=original&collapse=urlkey&limit={limit}"
        );
        let body = get_text(&self.client, &url).await?;
        let urls = parse_cdx_json(&body)?;
        debug!(host, count = urls.len(), "wayback seeds");
        Ok(urls)
    }
}

/// CDX JSON output is an array of rows; the first row is the header.
pub fn parse_cdx_json(body: &str) -> Result<Vec<String>, PassiveError> {
    let rows: Vec<Vec<String>> = serde_json::from_str(body)?;
    Ok(rows
        .into_iter()
        .skip(1)
        .filter_map(|row| row.into_iter().next())
        .collect())
}

/// CommonCrawl index API.
pub struct CommonCrawlSource {
    client: reqwest::Client,
}

impl CommonCrawlSource {
    pub fn new(user_agent: &str) -> Result<Self, PassiveError> {
        Ok(Self {
            client: archive_client(user_agent)?,
        })
    }
}

#[async_trait]
impl ArchiveSource for CommonCrawlSource {
    fn name(&self) -> &'static str {
        "commoncrawl"
    }

    async fn seed_urls(&self, host: &str, limit: usize) -> Result<Vec<String>, PassiveError> {
        let url = format!(
            "https://index.commoncrawl.org/{COMMONCRAWL_INDEX}-index?url={host}/*&output=json&limit={limit}"
        );
        let body = get_text(&self.client, &url).await?;
        Ok(parse_commoncrawl_ndjson(&body))
    }
}

/// The index answers with one JSON object per line.
pub fn parse_commoncrawl_ndjson(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|record| {
            record
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect()
}

/// VirusTotal v3 domain URL relationships. Needs an API key.
pub struct VirusTotalSource {
    client: reqwest::Client,
    api_key: String,
}

impl VirusTotalSource {
    pub fn new(user_agent: &str, api_key: String) -> Result<Self, PassiveError> {
        Ok(Self {
            client: archive_client(user_agent)?,
            api_key,
        })
    }
}

#[async_trait]
impl ArchiveSource for VirusTotalSource {
    fn name(&self) -> &'static str {
        "virustotal"
    }

    async fn seed_urls(&self, host: &str, limit: usize) -> Result<Vec<String>, PassiveError> {
        let limit = limit.min(40);
        let url = format!("https://www.virustotal.com/api/v3/domains/{host}/urls?limit={limit}");
        let response = self
            .client
            .get(&url)
            .header("x-apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| PassiveError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PassiveError::Fetch(format!(
                "virustotal returned status {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| PassiveError::Fetch(e.to_string()))?;
        parse_virustotal_json(&body)
    }
}

pub fn parse_virustotal_json(body: &str) -> Result<Vec<String>, PassiveError> {
    let value: Value = serde_json::from_str(body)?;
    let Some(data) = value.get("data").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    Ok(data
        .iter()
        .filter_map(|item| {
            item.pointer("/attributes/url")
                .or_else(|| item.pointer("/context_attributes/url"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect())
}
