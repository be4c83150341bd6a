//! Shared domain types
//!
//! Core result and artifact types produced by the fetch-and-extract
//! driver and consumed by the emitter, the adaptive learner, and the
//! sinks.

use crate::canonical::CanonicalUrl;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource class of a URL, used to pick the per-pattern enqueue cap
/// and to weight DOM buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Api,
    Form,
    Html,
    Image,
    Static,
}

impl ResourceClass {
    /// Maximum number of URLs enqueued per structural pattern.
    pub fn pattern_cap(&self) -> usize {
        match self {
            Self::Api | Self::Form => 5,
            Self::Html => 3,
            Self::Image => 2,
            Self::Static => 1,
        }
    }

    /// Classify a URL from its shape alone, before any fetch.
    pub fn classify(url: &CanonicalUrl) -> Self {
        match url.extension().as_deref() {
            Some("jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "ico" | "bmp" | "avif") => {
                return Self::Image
            }
            Some(
                "css" | "woff" | "woff2" | "ttf" | "otf" | "eot" | "mp4" | "mp3" | "webm" | "ogg"
                | "avi" | "mov" | "pdf" | "zip" | "tar" | "gz" | "rar" | "7z" | "exe" | "dmg",
            ) => return Self::Static,
            _ => {}
        }
        let path = url.path().to_ascii_lowercase();
        if path.contains("/api/")
            || path.contains("graphql")
            || path.ends_with("/api")
            || path.contains("/rest/")
            || path.ends_with(".json")
            || path.ends_with(".xml")
        {
            Self::Api
        } else {
            Self::Html
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Form => "form",
            Self::Html => "html",
            Self::Image => "image",
            Self::Static => "static",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a URL entered the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    Seed,
    Link,
    FormAction,
    Robots,
    Sitemap,
    Archive,
    BurpImport,
    HarImport,
    Fuzzer,
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Seed => "seed",
            Self::Link => "link",
            Self::FormAction => "form_action",
            Self::Robots => "robots",
            Self::Sitemap => "sitemap",
            Self::Archive => "archive",
            Self::BurpImport => "burp_import",
            Self::HarImport => "har_import",
            Self::Fuzzer => "fuzzer",
        };
        f.write_str(s)
    }
}

/// A form discovered on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    /// Canonical action URL.
    pub action: String,
    pub method: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub required: bool,
}

/// A static asset reference (image, script, stylesheet, font, media).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub url: String,
    pub kind: AssetKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Script,
    Stylesheet,
    Font,
    Media,
    Document,
    Other,
}

/// An API endpoint mined from JS or HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub url: String,
    pub method: String,
}

/// The result of fetching and extracting one URL. Produced by the
/// driver, fanned out to sinks, and consumed by the adaptive learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub url: CanonicalUrl,
    pub final_url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Page title when the body was parsed as HTML.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Response body, only populated when body capture is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Raw links harvested from the body, absolute-ized but not yet
    /// canonicalized.
    pub links: Vec<String>,
    pub assets: Vec<Asset>,
    pub forms: Vec<Form>,
    pub apis: Vec<ApiEndpoint>,
    /// Subdomains of the target seen in extracted URLs.
    pub subdomains: Vec<String>,
    pub depth: usize,
    pub discovered_by: DiscoverySource,
    pub resource_class: ResourceClass,
    pub elapsed_ms: u64,
    pub body_size: usize,
    /// Set when the DOM embedding matched an earlier page.
    pub is_similar: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar_to: Option<String>,
}

impl PageResult {
    /// A skeletal result for a static resource: no body parsing, no
    /// links.
    pub fn skeletal(
        url: CanonicalUrl,
        final_url: String,
        status: u16,
        headers: Vec<(String, String)>,
        content_type: Option<String>,
        resource_class: ResourceClass,
        depth: usize,
        discovered_by: DiscoverySource,
        elapsed_ms: u64,
        body_size: usize,
    ) -> Self {
        Self {
            url,
            final_url,
            status,
            headers,
            content_type,
            title: None,
            body: None,
            links: Vec::new(),
            assets: Vec::new(),
            forms: Vec::new(),
            apis: Vec::new(),
            subdomains: Vec::new(),
            depth,
            discovered_by,
            resource_class,
            elapsed_ms,
            body_size,
            is_similar: false,
            similar_to: None,
        }
    }

    /// Value of this URL on a 0..=100 scale, input to the adaptive
    /// learner.
    pub fn value_score(&self) -> u8 {
        let mut score: i32 = 50;
        if !self.apis.is_empty() {
            score += 20;
        }
        if !self.forms.is_empty() {
            score += 15;
        }
        if self.links.len() > 10 {
            score += 10;
        } else if self.links.len() > 5 {
            score += 5;
        }
        if self.status == 200 {
            score += 5;
        }
        if self.status >= 400 {
            score -= 20;
        }
        score.clamp(0, 100) as u8
    }

    pub fn value_tier(&self) -> ValueTier {
        ValueTier::from_score(self.value_score())
    }
}

/// Value tier buckets used by the learner's rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTier {
    High,
    Mid,
    Low,
}

impl ValueTier {
    /// High-value pages score 80+. A bare 200 page with no artifacts
    /// scores 55 and counts as low so the learner reacts to
    /// artifact-free crawls.
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => Self::High,
            60..=79 => Self::Mid,
            _ => Self::Low,
        }
    }
}

/// A noteworthy observation about a page, routed to sinks separately
/// from the result stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub url: String,
    pub kind: String,
    pub detail: String,
}

/// Final crawl summary delivered to every sink on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub task_id: String,
    pub target: String,
    pub total_crawled: usize,
    pub total_failed: usize,
    pub total_skipped: usize,
    pub apis_found: usize,
    pub forms_found: usize,
    pub subdomains_found: usize,
    pub external_links: usize,
    pub duration_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;

    fn result_with(status: u16, links: usize, apis: usize, forms: usize) -> PageResult {
        let url = canonicalize("https://example.com/x").unwrap();
        let mut result = PageResult::skeletal(
            url,
            "https://example.com/x".into(),
            status,
            vec![],
            Some("text/html".into()),
            ResourceClass::Html,
            1,
            DiscoverySource::Link,
            10,
            100,
        );
        result.links = (0..links).map(|i| format!("https://example.com/{i}")).collect();
        result.apis = (0..apis)
            .map(|i| ApiEndpoint {
                url: format!("/api/{i}"),
                method: "GET".into(),
            })
            .collect();
        result.forms = (0..forms)
            .map(|_| Form {
                action: "https://example.com/submit".into(),
                method: "POST".into(),
                fields: vec![],
            })
            .collect();
        result
    }

    #[test]
    fn test_value_score_low_value_page() {
        // 200 with no artifacts: 50 + 5 = 55.
        assert_eq!(result_with(200, 0, 0, 0).value_score(), 55);
    }

    #[test]
    fn test_value_score_rich_page() {
        // 50 + 20 api + 15 form + 10 links + 5 status = 100.
        assert_eq!(result_with(200, 11, 1, 1).value_score(), 100);
    }

    #[test]
    fn test_value_score_error_page() {
        // 50 - 20 = 30.
        assert_eq!(result_with(404, 0, 0, 0).value_score(), 30);
    }

    #[test]
    fn test_value_score_clamped() {
        let mut r = result_with(500, 0, 0, 0);
        r.status = 500;
        assert!(r.value_score() <= 100);
    }

    #[test]
    fn test_value_tiers() {
        assert_eq!(ValueTier::from_score(80), ValueTier::High);
        assert_eq!(ValueTier::from_score(79), ValueTier::Mid);
        assert_eq!(ValueTier::from_score(60), ValueTier::Mid);
        assert_eq!(ValueTier::from_score(55), ValueTier::Low);
        assert_eq!(ValueTier::from_score(49), ValueTier::Low);
    }

    #[test]
    fn test_classify_from_url_shape() {
        let api = canonicalize("https://example.com/api/v1/users").unwrap();
        assert_eq!(ResourceClass::classify(&api), ResourceClass::Api);

        let img = canonicalize("https://example.com/logo.png").unwrap();
        assert_eq!(ResourceClass::classify(&img), ResourceClass::Image);

        let pdf = canonicalize("https://example.com/report.pdf").unwrap();
        assert_eq!(ResourceClass::classify(&pdf), ResourceClass::Static);

        let page = canonicalize("https://example.com/about").unwrap();
        assert_eq!(ResourceClass::classify(&page), ResourceClass::Html);
    }

    #[test]
    fn test_pattern_caps() {
        assert_eq!(ResourceClass::Api.pattern_cap(), 5);
        assert_eq!(ResourceClass::Form.pattern_cap(), 5);
        assert_eq!(ResourceClass::Html.pattern_cap(), 3);
        assert_eq!(ResourceClass::Image.pattern_cap(), 2);
        assert_eq!(ResourceClass::Static.pattern_cap(), 1);
    }
}
