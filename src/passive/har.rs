//! HAR 1.2 import
//!
//! Reads a browser/proxy HTTP Archive and yields the request URLs and
//! methods from `log.entries[].request`.

use super::PassiveError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct HarFile {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
}

#[derive(Debug, Deserialize)]
pub struct HarRequest {
    pub method: String,
    pub url: String,
}

pub fn parse_har_file(path: &Path) -> Result<Vec<HarRequest>, PassiveError> {
    let content = fs::read_to_string(path)?;
    parse_har_json(&content)
}

pub fn parse_har_json(json: &str) -> Result<Vec<HarRequest>, PassiveError> {
    let har: HarFile = serde_json::from_str(json)?;
    Ok(har
        .log
        .entries
        .into_iter()
        .map(|entry| entry.request)
        .filter(|request| !request.url.is_empty())
        .collect())
}
