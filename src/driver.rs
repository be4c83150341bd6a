//! Fetch-and-extract driver
//!
//! Takes one frontier entry through fetch, static detection, extractor
//! dispatch and the DOM near-duplicate check, producing a
//! [`PageResult`]. Static resources get a skeletal result with no link
//! extraction.

use crate::canonical::CanonicalUrl;
use crate::config::CrawlConfig;
use crate::dedup::DedupStack;
use crate::extract::{ContentKind, CssExtractor, ExtractedArtifacts, Extractor, HtmlExtractor, JsExtractor};
use crate::fetch::{FetchError, FetchOptions, FetchResponse, Fetcher};
use crate::frontier::FrontierEntry;
use crate::types::{PageResult, ResourceClass};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// What to do with a fetched body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Detection {
    /// Emit a skeletal result, do not parse.
    Static(ResourceClass),
    /// Run the extractor for this kind.
    Parse(ContentKind),
}

/// Decide static versus parseable. Extension is the fast path, then
/// the Content-Type prefix, then magic bytes for dynamic URLs that
/// actually serve binaries (`showimage.php?file=...`).
fn detect(url: &CanonicalUrl, response: &FetchResponse) -> Detection {
    let extension_kind = url.extension().as_deref().and_then(ContentKind::from_extension);
    if extension_kind.is_none() {
        match ResourceClass::classify(url) {
            class @ (ResourceClass::Image | ResourceClass::Static) if !url.has_params() => {
                return Detection::Static(class);
            }
            _ => {}
        }
    }

    if let Some(content_type) = response.content_type() {
        if let Some(class) = static_class_for_content_type(content_type) {
            return Detection::Static(class);
        }
        if let Some(kind) = ContentKind::from_content_type(content_type) {
            return Detection::Parse(kind);
        }
    }

    if let Some(class) = sniff_static(&response.body) {
        return Detection::Static(class);
    }

    if let Some(kind) = extension_kind {
        return Detection::Parse(kind);
    }

    match ResourceClass::classify(url) {
        class @ (ResourceClass::Image | ResourceClass::Static) => Detection::Static(class),
        _ => Detection::Parse(ContentKind::Html),
    }
}

fn static_class_for_content_type(content_type: &str) -> Option<ResourceClass> {
    let lower = content_type.to_ascii_lowercase();
    if lower.starts_with("image/") {
        Some(ResourceClass::Image)
    } else if lower.starts_with("video/") || lower.starts_with("audio/") || lower.starts_with("font/")
    {
        Some(ResourceClass::Static)
    } else {
        None
    }
}

/// Magic-byte sniffing for JPEG, PNG, GIF, WEBP, PDF and ZIP.
fn sniff_static(body: &[u8]) -> Option<ResourceClass> {
    if body.starts_with(&[0xFF, 0xD8, 0xFF])
        || body.starts_with(&[0x89, b'P', b'N', b'G'])
        || body.starts_with(b"GIF8")
        || (body.len() >= 12 && &body[..4] == b"RIFF" && &body[8..12] == b"WEBP")
    {
        return Some(ResourceClass::Image);
    }
    if body.starts_with(b"%PDF") || body.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        return Some(ResourceClass::Static);
    }
    None
}

/// Drives one URL from fetch to `PageResult`.
pub struct Driver {
    fetcher: Arc<dyn Fetcher>,
    dedup: Arc<DedupStack>,
    html: HtmlExtractor,
    js: JsExtractor,
    css: CssExtractor,
    include_body: bool,
    max_body_bytes_html: usize,
    max_body_bytes_js: usize,
}

impl Driver {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        dedup: Arc<DedupStack>,
        target_root: &str,
        config: &CrawlConfig,
        include_body: bool,
    ) -> Self {
        Self {
            fetcher,
            dedup,
            html: HtmlExtractor::new(target_root),
            js: JsExtractor::new(target_root),
            css: CssExtractor::new(),
            include_body,
            max_body_bytes_html: config.max_body_bytes_html,
            max_body_bytes_js: config.max_body_bytes_js,
        }
    }

    /// Fetch and extract one entry. The timeout comes from the pool's
    /// adaptive policy.
    pub async fn process(
        &self,
        entry: &FrontierEntry,
        timeout: Duration,
    ) -> Result<PageResult, FetchError> {
        let max_body_bytes = match entry.value_type {
            ResourceClass::Html | ResourceClass::Api | ResourceClass::Form => {
                self.max_body_bytes_html
            }
            _ => self.max_body_bytes_js,
        };
        let options = FetchOptions {
            timeout,
            max_body_bytes,
        };
        let response = self.fetcher.fetch(&entry.url, &options).await?;
        Ok(self.build_result(entry, response))
    }

    fn build_result(&self, entry: &FrontierEntry, response: FetchResponse) -> PageResult {
        let detection = detect(&entry.url, &response);
        let content_type = response.content_type().map(|ct| ct.to_string());

        let mut result = PageResult::skeletal(
            entry.url.clone(),
            response.final_url.clone(),
            response.status,
            response.headers.clone(),
            content_type,
            entry.value_type,
            entry.depth,
            entry.discovered_by,
            response.elapsed_ms,
            response.body.len(),
        );

        let kind = match detection {
            Detection::Static(class) => {
                result.resource_class = class;
                debug!(url = %entry.url, class = %class, "static resource, skipping extraction");
                return result;
            }
            Detection::Parse(kind) => kind,
        };

        let body = response.body_text();
        let base = match Url::parse(&response.final_url) {
            Ok(base) => base,
            Err(e) => {
                warn!(url = %entry.url, error = %e, "unparseable final URL, skipping extraction");
                return result;
            }
        };

        let extractor: &dyn Extractor = match kind {
            ContentKind::Html => &self.html,
            ContentKind::Js => &self.js,
            ContentKind::Css => &self.css,
        };
        let artifacts = match extractor.extract(&base, &body) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!(url = %entry.url, error = %e, "extraction failed, emitting bare result");
                ExtractedArtifacts::default()
            }
        };

        if kind == ContentKind::Html {
            if let Some((other_url, similarity)) = self.dedup.check_content(&entry.url, &body) {
                debug!(url = %entry.url, other = %other_url, similarity, "near-duplicate page");
                result.is_similar = true;
                result.similar_to = Some(other_url);
            }
        }

        result.title = artifacts.title;
        result.links = artifacts.links;
        result.assets = artifacts.assets;
        result.forms = artifacts.forms;
        result.apis = artifacts.apis;
        result.subdomains = artifacts.subdomains;
        if self.include_body {
            result.body = Some(body);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::config::DedupConfig;
    use crate::types::DiscoverySource;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct MockFetcher {
        responses: Mutex<HashMap<String, FetchResponse>>,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
            }
        }

        fn stub(&self, url: &str, content_type: &str, body: &[u8]) {
            self.responses.lock().insert(
                url.to_string(),
                FetchResponse {
                    final_url: url.to_string(),
                    status: 200,
                    headers: if content_type.is_empty() {
                        vec![]
                    } else {
                        vec![("content-type".into(), content_type.into())]
                    },
                    body: body.to_vec(),
                    elapsed_ms: 3,
                    truncated: false,
                },
            );
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(
            &self,
            url: &CanonicalUrl,
            _options: &FetchOptions,
        ) -> Result<FetchResponse, FetchError> {
            self.responses
                .lock()
                .get(url.as_str())
                .cloned()
                .ok_or(FetchError::ConnectionReset)
        }
    }

    fn entry_for(url: &str) -> FrontierEntry {
        let url = canonicalize(url).unwrap();
        FrontierEntry {
            value_type: ResourceClass::classify(&url),
            has_params: url.has_params(),
            url,
            depth: 1,
            discovered_at: 0,
            is_internal: true,
            priority_score: 1.0,
            discovered_by: DiscoverySource::Link,
        }
    }

    fn driver(fetcher: Arc<MockFetcher>) -> Driver {
        Driver::new(
            fetcher,
            Arc::new(DedupStack::new(&DedupConfig::default())),
            "example.com",
            &CrawlConfig::default(),
            false,
        )
    }

    #[tokio::test]
    async fn test_html_page_extracted() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.stub(
            "https://example.com/",
            "text/html; charset=utf-8",
            b"<html><head><title>Home</title></head>\
              <body><a href=\"/next\">next</a></body></html>",
        );
        let driver = driver(Arc::clone(&fetcher));

        let result = driver
            .process(&entry_for("https://example.com/"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.title.as_deref(), Some("Home"));
        assert_eq!(result.links, vec!["https://example.com/next"]);
        assert!(!result.is_similar);
    }

    #[tokio::test]
    async fn test_image_content_type_skips_extraction() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.stub(
            "https://example.com/banner",
            "image/png",
            b"<html><a href=\"/never\">x</a></html>",
        );
        let driver = driver(Arc::clone(&fetcher));

        let result = driver
            .process(&entry_for("https://example.com/banner"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.resource_class, ResourceClass::Image);
        assert!(result.links.is_empty());
    }

    #[tokio::test]
    async fn test_magic_bytes_catch_dynamic_image() {
        let fetcher = Arc::new(MockFetcher::new());
        // PHP URL serving a JPEG with no content type.
        let mut body = vec![0xFF, 0xD8, 0xFF, 0xE0];
        body.extend_from_slice(&[0u8; 32]);
        fetcher.stub("https://example.com/showimage.php?file=1", "", &body);
        let driver = driver(Arc::clone(&fetcher));

        let result = driver
            .process(
                &entry_for("https://example.com/showimage.php?file=1"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(result.resource_class, ResourceClass::Image);
        assert!(result.links.is_empty());
    }

    #[tokio::test]
    async fn test_js_body_mined_for_endpoints() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.stub(
            "https://example.com/app.js",
            "application/javascript",
            b"fetch('/api/v1/users');",
        );
        let driver = driver(Arc::clone(&fetcher));

        let result = driver
            .process(&entry_for("https://example.com/app.js"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.apis.len(), 1);
        assert!(result.apis[0].url.ends_with("/api/v1/users"));
    }

    #[tokio::test]
    async fn test_near_duplicate_flagged_links_kept() {
        let fetcher = Arc::new(MockFetcher::new());
        let page = |title: &str| {
            format!(
                "<html><head><title>{title}</title></head><body>\
                 <div id=\"m\"><h1>Catalog</h1>\
                 <ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>\
                 <p>one</p><p>two</p><p>three</p><p>four</p><p>five</p>\
                 <a href=\"/detail\">detail</a></div></body></html>"
            )
        };
        fetcher.stub("https://example.com/a", "text/html", page("First").as_bytes());
        fetcher.stub("https://example.com/b", "text/html", page("Second").as_bytes());
        let driver = driver(Arc::clone(&fetcher));

        let first = driver
            .process(&entry_for("https://example.com/a"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!first.is_similar);

        let second = driver
            .process(&entry_for("https://example.com/b"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(second.is_similar);
        assert_eq!(second.similar_to.as_deref(), Some("https://example.com/a"));
        // Links from a near-duplicate are still harvested.
        assert_eq!(second.links, vec!["https://example.com/detail"]);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let fetcher = Arc::new(MockFetcher::new());
        let driver = driver(Arc::clone(&fetcher));
        let outcome = driver
            .process(&entry_for("https://example.com/missing"), Duration::from_secs(5))
            .await;
        assert!(matches!(outcome, Err(FetchError::ConnectionReset)));
    }

    #[test]
    fn test_sniff_static() {
        assert_eq!(sniff_static(b"%PDF-1.7"), Some(ResourceClass::Static));
        assert_eq!(sniff_static(b"GIF89a"), Some(ResourceClass::Image));
        assert_eq!(
            sniff_static(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some(ResourceClass::Image)
        );
        assert_eq!(sniff_static(b"<html>"), None);
    }
}
