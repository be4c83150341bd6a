//! Pattern fuzzer
//!
//! Synthesizes `?param=value` variants for parameter-less URLs that
//! fetched successfully. Variants go through the harvester like any
//! other link, so the structural pattern caps bound them. The smart
//! param validator fetches each variant, compares its response
//! signature against a baseline, and abandons a parameter once a long
//! enough streak of identical responses shows the server ignores it.

use crate::canonical::CanonicalUrl;
use crate::config::FuzzerConfig;
use crate::fetch::{FetchError, FetchOptions, Fetcher};
use crate::harvest::{Harvester, HarvestOutcome};
use crate::types::DiscoverySource;
use crate::util::fnv1a64;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Response signature for variant comparison: status, body length,
/// body hash and title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSignature {
    pub status: u16,
    pub length: usize,
    pub body_hash: u64,
    pub title: Option<String>,
}

impl ResponseSignature {
    pub fn of(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            length: body.len(),
            body_hash: fnv1a64(body),
            title: extract_title(body),
        }
    }
}

fn extract_title(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let lower = text.to_ascii_lowercase();
    let start = lower.find("<title")? + lower[lower.find("<title")?..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    Some(text[start..end].trim().to_string())
}

/// Outcome of validating one parameter against the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamVerdict {
    /// At least one value changed the response.
    Effective,
    /// Every tried value produced the baseline signature.
    Ignored,
    /// Validation abandoned after an identical-response streak.
    Abandoned,
}

pub struct PatternFuzzer {
    config: FuzzerConfig,
    harvester: Arc<Harvester>,
}

impl PatternFuzzer {
    pub fn new(config: FuzzerConfig, harvester: Arc<Harvester>) -> Self {
        Self { config, harvester }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Generate all `?param=value` variant URLs for a base URL.
    pub fn variants(&self, url: &CanonicalUrl) -> Vec<String> {
        let base = url.as_str();
        let mut variants = Vec::with_capacity(self.config.params.len() * self.config.values.len());
        for param in &self.config.params {
            for value in &self.config.values {
                variants.push(format!("{base}?{param}={value}"));
            }
        }
        variants
    }

    /// Offer variants of a successfully-fetched, parameter-less URL to
    /// the harvester. Returns how many were enqueued.
    pub fn fuzz(&self, url: &CanonicalUrl, depth: usize) -> usize {
        if !self.config.enabled || url.has_params() {
            return 0;
        }
        let mut enqueued = 0;
        for variant in self.variants(url) {
            if matches!(
                self.harvester
                    .offer_at_depth(&variant, depth, DiscoverySource::Fuzzer),
                HarvestOutcome::Enqueued(_)
            ) {
                enqueued += 1;
            }
        }
        if enqueued > 0 {
            debug!(url = %url, enqueued, "fuzzer variants enqueued");
        }
        enqueued
    }

    /// Smart param validator: fetch the baseline, then each value for
    /// each parameter. A parameter whose every response matches the
    /// baseline is ignored by the server; once the fraction of
    /// consecutive identical signatures reaches the configured
    /// threshold, the remaining values are abandoned.
    pub async fn validate_params(
        &self,
        fetcher: &dyn Fetcher,
        url: &CanonicalUrl,
        timeout: Duration,
    ) -> Result<Vec<(String, ParamVerdict)>, FetchError> {
        let options = FetchOptions {
            timeout,
            ..FetchOptions::default()
        };
        let baseline_response = fetcher.fetch(url, &options).await?;
        let baseline = ResponseSignature::of(baseline_response.status, &baseline_response.body);

        let mut verdicts = Vec::new();
        for param in &self.config.params {
            let verdict = self
                .validate_one_param(fetcher, url, param, &baseline, &options)
                .await;
            verdicts.push((param.clone(), verdict));
        }
        info!(url = %url, effective = verdicts
            .iter()
            .filter(|(_, v)| *v == ParamVerdict::Effective)
            .count(), "param validation done");
        Ok(verdicts)
    }

    async fn validate_one_param(
        &self,
        fetcher: &dyn Fetcher,
        url: &CanonicalUrl,
        param: &str,
        baseline: &ResponseSignature,
        options: &FetchOptions,
    ) -> ParamVerdict {
        let total = self.config.values.len();
        let mut identical_streak = 0usize;
        let mut tried = 0usize;

        for value in &self.config.values {
            let raw = format!("{}?{param}={value}", url.as_str());
            let Ok(variant_url) = crate::canonical::canonicalize(&raw) else {
                continue;
            };
            let Ok(response) = fetcher.fetch(&variant_url, options).await else {
                continue;
            };
            tried += 1;
            let signature = ResponseSignature::of(response.status, &response.body);
            if signature == *baseline {
                identical_streak += 1;
                if total > 1
                    && identical_streak as f64 / total as f64 >= self.config.identical_threshold
                {
                    return ParamVerdict::Abandoned;
                }
            } else {
                return ParamVerdict::Effective;
            }
        }

        if tried > 0 {
            ParamVerdict::Ignored
        } else {
            ParamVerdict::Abandoned
        }
    }
}
