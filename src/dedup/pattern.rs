//! Structural URL patterns
//!
//! Collapses families of URLs that differ only in identifiers into a
//! single pattern key: variable path segments become `{num}`,
//! `{uuid}` or `{hash}` placeholders and query values are emptied.
//! The registry enforces a per-pattern enqueue cap typed by resource
//! class.

use crate::canonical::CanonicalUrl;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn embedded_num_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*[-_])(\d+)(.*)$").expect("static regex"))
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .expect("static regex")
    })
}

/// Derive the structural pattern key for a canonical URL.
pub fn structural_pattern(url: &CanonicalUrl) -> String {
    let mut pattern = String::with_capacity(url.path().len() + 8);
    for segment in url.path().split('/').skip(1) {
        pattern.push('/');
        pattern.push_str(&segment_pattern(segment));
    }
    if pattern.is_empty() {
        pattern.push('/');
    }
    if url.path().len() > 1 && url.path().ends_with('/') && !pattern.ends_with('/') {
        pattern.push('/');
    }
    if url.has_params() {
        pattern.push('?');
        let mut first = true;
        for (key, _) in url.query_pairs() {
            if !first {
                pattern.push('&');
            }
            first = false;
            pattern.push_str(key);
            pattern.push('=');
        }
    }
    pattern
}

fn segment_pattern(segment: &str) -> String {
    if segment.is_empty() {
        return String::new();
    }
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return "{num}".to_string();
    }
    if uuid_re().is_match(segment) {
        return "{uuid}".to_string();
    }
    if segment.len() >= 24 && segment.chars().all(|c| c.is_ascii_hexdigit()) {
        return "{hash}".to_string();
    }
    if let Some(caps) = embedded_num_re().captures(segment) {
        return format!("{}{{num}}{}", &caps[1], &caps[3]);
    }
    segment.to_string()
}

/// Per-pattern admission record.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    /// URLs admitted under this pattern, never exceeds the cap.
    pub count: usize,
    /// URLs rejected after the cap was reached.
    pub skipped: usize,
    /// First canonical URL seen for the pattern.
    pub first_url: String,
    /// Up to `sample_cap` admitted canonical URLs.
    pub sample_urls: Vec<String>,
}

/// Registry of structural patterns and their admission counts.
///
/// Not internally synchronized; the dedup stack holds it inside its
/// critical section.
pub struct PatternRegistry {
    entries: HashMap<String, PatternEntry>,
    sample_cap: usize,
}

impl PatternRegistry {
    pub fn new(sample_cap: usize) -> Self {
        Self {
            entries: HashMap::new(),
            sample_cap,
        }
    }

    /// Whether the pattern still has room under the cap.
    pub fn would_admit(&self, pattern: &str, cap: usize) -> bool {
        self.entries
            .get(pattern)
            .map(|e| e.count < cap)
            .unwrap_or(true)
    }

    /// Admit a URL under a pattern. Caller must have checked
    /// `would_admit` inside the same critical section.
    pub fn admit(&mut self, pattern: &str, url: &str) {
        let entry = self
            .entries
            .entry(pattern.to_string())
            .or_insert_with(|| PatternEntry {
                count: 0,
                skipped: 0,
                first_url: url.to_string(),
                sample_urls: Vec::new(),
            });
        entry.count += 1;
        if entry.sample_urls.len() < self.sample_cap {
            entry.sample_urls.push(url.to_string());
        }
    }

    /// Record a cap rejection.
    pub fn record_skip(&mut self, pattern: &str) {
        if let Some(entry) = self.entries.get_mut(pattern) {
            entry.skipped += 1;
        }
    }

    pub fn get(&self, pattern: &str) -> Option<&PatternEntry> {
        self.entries.get(pattern)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total URLs skipped across all patterns.
    pub fn total_skipped(&self) -> usize {
        self.entries.values().map(|e| e.skipped).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PatternEntry)> {
        self.entries.iter()
    }
}
