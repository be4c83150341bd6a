//! Artifact extraction
//!
//! Extractors turn a fetched body into links, assets, forms and API
//! endpoints. They are registered by content kind; the driver picks
//! the set to run from the response's Content-Type, falling back to
//! the URL extension.

mod css;
mod html;
mod js;

pub use css::CssExtractor;
pub use html::HtmlExtractor;
pub use js::JsExtractor;

use crate::types::{ApiEndpoint, Asset, Form};
use thiserror::Error;
use url::Url;

/// Body kind an extractor handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Html,
    Js,
    Css,
}

impl ContentKind {
    /// Classify from a Content-Type header value.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let lower = content_type.to_ascii_lowercase();
        let mime = lower.split(';').next().unwrap_or("").trim().to_string();
        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "text/javascript" | "application/javascript" | "application/x-javascript"
            | "module" => Some(Self::Js),
            "text/css" => Some(Self::Css),
            _ => None,
        }
    }

    /// Classify from a URL extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "html" | "htm" | "xhtml" | "php" | "asp" | "aspx" | "jsp" => Some(Self::Html),
            "js" | "mjs" | "jsx" => Some(Self::Js),
            "css" => Some(Self::Css),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("body is not valid for this extractor: {0}")]
    InvalidBody(String),
}

/// Everything mined from one body.
#[derive(Debug, Clone, Default)]
pub struct ExtractedArtifacts {
    /// Absolute URLs to feed the harvester.
    pub links: Vec<String>,
    pub assets: Vec<Asset>,
    pub forms: Vec<Form>,
    pub apis: Vec<ApiEndpoint>,
    /// Hosts under the target's registrable domain seen in links.
    pub subdomains: Vec<String>,
    /// Page title, HTML only.
    pub title: Option<String>,
}

impl ExtractedArtifacts {
    /// Merge another extraction into this one, deduplicating APIs and
    /// subdomains.
    pub fn merge(&mut self, other: ExtractedArtifacts) {
        self.links.extend(other.links);
        self.assets.extend(other.assets);
        self.forms.extend(other.forms);
        for api in other.apis {
            if !self.apis.contains(&api) {
                self.apis.push(api);
            }
        }
        for subdomain in other.subdomains {
            if !self.subdomains.contains(&subdomain) {
                self.subdomains.push(subdomain);
            }
        }
        if self.title.is_none() {
            self.title = other.title;
        }
    }
}

/// One registered extractor.
pub trait Extractor: Send + Sync {
    fn kind(&self) -> ContentKind;

    /// Extract artifacts from a body. Relative URLs are absolutized
    /// against `final_url`; individual unparseable artifacts are
    /// skipped, not errors.
    fn extract(&self, final_url: &Url, body: &str) -> Result<ExtractedArtifacts, ExtractorError>;
}

/// Resolve a possibly-relative reference against the page URL.
/// Returns `None` for unparseable or non-http(s) results.
pub(crate) fn absolutize(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    let joined = base.join(reference).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// Record `host` as a subdomain when it sits under the registrable
/// domain of `target_root` and is not the root itself.
pub(crate) fn subdomain_of(host: &str, target_root: &str) -> Option<String> {
    if !target_root.is_empty()
        && host != target_root
        && host.ends_with(&format!(".{target_root}"))
    {
        Some(host.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_from_content_type() {
        assert_eq!(
            ContentKind::from_content_type("text/html; charset=utf-8"),
            Some(ContentKind::Html)
        );
        assert_eq!(
            ContentKind::from_content_type("application/javascript"),
            Some(ContentKind::Js)
        );
        assert_eq!(ContentKind::from_content_type("text/css"), Some(ContentKind::Css));
        assert_eq!(ContentKind::from_content_type("image/png"), None);
    }

    #[test]
    fn test_content_kind_from_extension() {
        assert_eq!(ContentKind::from_extension("php"), Some(ContentKind::Html));
        assert_eq!(ContentKind::from_extension("mjs"), Some(ContentKind::Js));
        assert_eq!(ContentKind::from_extension("png"), None);
    }

    #[test]
    fn test_absolutize() {
        let base = Url::parse("https://example.com/a/b/page.html").unwrap();
        assert_eq!(
            absolutize(&base, "../up").as_deref(),
            Some("https://example.com/a/up")
        );
        assert_eq!(
            absolutize(&base, "https://other.com/x").as_deref(),
            Some("https://other.com/x")
        );
        assert!(absolutize(&base, "javascript:void(0)").is_none());
        assert!(absolutize(&base, "  ").is_none());
    }

    #[test]
    fn test_subdomain_of() {
        assert_eq!(
            subdomain_of("api.example.com", "example.com").as_deref(),
            Some("api.example.com")
        );
        assert!(subdomain_of("example.com", "example.com").is_none());
        assert!(subdomain_of("example.org", "example.com").is_none());
    }
}
