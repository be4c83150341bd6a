//! Pre-canonicalization URL gate
//!
//! Cheap textual checks applied to raw URL candidates before they are
//! parsed. Rejects non-navigable schemes, URLs with embedded markup
//! (usually the product of sloppy extraction), pathological lengths,
//! and crawl-trap shapes like repeated path segments or calendar
//! pagination.

use tracing::trace;

/// Configuration for the URL validator.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum raw URL length in characters.
    pub max_url_length: usize,
    /// Maximum URL path depth (number of segments).
    pub max_path_depth: usize,
    /// Maximum number of repeated path segments before the URL is
    /// considered a trap.
    pub max_repeated_segments: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_url_length: 2048,
            max_path_depth: 15,
            max_repeated_segments: 3,
        }
    }
}

/// Schemes that can never be fetched; rejected without parsing.
const NON_NAVIGABLE_PREFIXES: &[&str] = &[
    "javascript:",
    "mailto:",
    "tel:",
    "data:",
    "blob:",
    "about:",
    "file:",
    "ftp:",
];

/// Validates raw URL candidates before canonicalization.
#[derive(Debug, Clone, Default)]
pub struct SmartUrlValidator {
    config: ValidatorConfig,
}

impl SmartUrlValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Whether a raw candidate is worth canonicalizing at all.
    pub fn is_acceptable(&self, raw: &str) -> bool {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > self.config.max_url_length {
            return false;
        }

        let lower_head: String = raw
            .chars()
            .take(16)
            .collect::<String>()
            .to_ascii_lowercase();
        if NON_NAVIGABLE_PREFIXES
            .iter()
            .any(|p| lower_head.starts_with(p))
        {
            return false;
        }

        // Markup or template fragments mean the extractor picked up
        // something that is not a URL.
        if raw.contains('<') || raw.contains('>') || raw.contains("{{") || raw.contains("${") {
            trace!(candidate = %crate::util::truncate_str(raw, 80), "rejected markup fragment");
            return false;
        }

        // Unencoded whitespace inside the URL body.
        if raw.chars().any(|c| c.is_whitespace()) {
            return false;
        }

        true
    }

    /// Trap heuristics applied to a cleaned path after
    /// canonicalization.
    pub fn is_trap_path(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.len() > self.config.max_path_depth {
            return true;
        }
        if has_repetitive_pattern(&segments, self.config.max_repeated_segments) {
            return true;
        }
        is_calendar_trap(&segments)
    }
}

fn has_repetitive_pattern(segments: &[&str], max_repeats: usize) -> bool {
    if segments.len() < 4 {
        return false;
    }
    for window_size in 1..=segments.len() / 2 {
        let mut repeat_count = 0;
        for i in 0..segments.len().saturating_sub(window_size) {
            if segments[i] == segments[i + window_size] {
                repeat_count += 1;
                if repeat_count >= max_repeats {
                    return true;
                }
            }
        }
    }
    false
}

/// Three or more consecutive all-numeric segments, e.g.
/// `/calendar/2024/01/15`.
fn is_calendar_trap(segments: &[&str]) -> bool {
    let mut consecutive_numbers = 0;
    for segment in segments {
        if segment.parse::<u32>().is_ok() {
            consecutive_numbers += 1;
            if consecutive_numbers >= 3 {
                return true;
            }
        } else {
            consecutive_numbers = 0;
        }
    }
    false
}
