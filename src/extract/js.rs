//! JavaScript artifact mining
//!
//! Regex-based mining of URL string literals and API call sites
//! (`fetch`, `axios`, `$.ajax`, `XMLHttpRequest.open`). Used both for
//! fetched JS files and for inline scripts found by the HTML
//! extractor.

use super::{absolutize, subdomain_of, ContentKind, ExtractedArtifacts, Extractor, ExtractorError};
use crate::types::ApiEndpoint;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex"))
        }
    };
}

static_regex!(full_url_re, r#"["'](https?://[^\s"'<>]{4,500})["']"#);
static_regex!(path_literal_re, r#"["'](/[A-Za-z0-9_\-./]{1,300}(?:\?[A-Za-z0-9_\-=&%.]{0,200})?)["']"#);
static_regex!(fetch_re, r#"fetch\(\s*["']([^"']+)["']"#);
static_regex!(
    axios_method_re,
    r#"axios\.(get|post|put|delete|patch|head)\(\s*["']([^"']+)["']"#
);
static_regex!(
    axios_config_re,
    r#"(?s)axios\(\s*\{[^}]*?url\s*:\s*["']([^"']+)["']"#
);
static_regex!(
    jquery_ajax_re,
    r#"(?s)\$\.ajax\(\s*\{[^}]*?url\s*:\s*["']([^"']+)["']"#
);
static_regex!(
    xhr_open_re,
    r#"(?i)\.open\(\s*["'](GET|POST|PUT|DELETE|PATCH|HEAD)["']\s*,\s*["']([^"']+)["']"#
);

/// Mine one script body. Shared by the JS extractor and the HTML
/// extractor's inline-script handling.
pub(crate) fn mine_script_text(
    base: &Url,
    script: &str,
    target_root: &str,
) -> ExtractedArtifacts {
    let mut artifacts = ExtractedArtifacts::default();

    let push_api = |artifacts: &mut ExtractedArtifacts, raw: &str, method: &str| {
        if let Some(absolute) = absolutize(base, raw) {
            let endpoint = ApiEndpoint {
                url: absolute.clone(),
                method: method.to_ascii_uppercase(),
            };
            if !artifacts.apis.contains(&endpoint) {
                artifacts.apis.push(endpoint);
            }
            push_link(artifacts, absolute, target_root);
        }
    };

    for caps in fetch_re().captures_iter(script) {
        push_api(&mut artifacts, &caps[1], "GET");
    }
    for caps in axios_method_re().captures_iter(script) {
        let method = caps[1].to_string();
        push_api(&mut artifacts, &caps[2], &method);
    }
    for caps in axios_config_re().captures_iter(script) {
        push_api(&mut artifacts, &caps[1], "GET");
    }
    for caps in jquery_ajax_re().captures_iter(script) {
        push_api(&mut artifacts, &caps[1], "GET");
    }
    for caps in xhr_open_re().captures_iter(script) {
        let method = caps[1].to_string();
        push_api(&mut artifacts, &caps[2], &method);
    }

    for caps in full_url_re().captures_iter(script) {
        if let Some(absolute) = absolutize(base, &caps[1]) {
            push_link(&mut artifacts, absolute, target_root);
        }
    }
    for caps in path_literal_re().captures_iter(script) {
        let path = &caps[1];
        if !plausible_path(path) {
            continue;
        }
        if let Some(absolute) = absolutize(base, path) {
            push_link(&mut artifacts, absolute, target_root);
        }
    }

    artifacts
}

fn push_link(artifacts: &mut ExtractedArtifacts, absolute: String, target_root: &str) {
    if let Ok(parsed) = Url::parse(&absolute) {
        if let Some(host) = parsed.host_str() {
            if let Some(sub) = subdomain_of(host, target_root) {
                if !artifacts.subdomains.contains(&sub) {
                    artifacts.subdomains.push(sub);
                }
            }
        }
    }
    if !artifacts.links.contains(&absolute) {
        artifacts.links.push(absolute);
    }
}

/// Filter out string literals that start with `/` but are clearly not
/// URL paths (regex sources, protocol-relative URLs, lone slashes).
fn plausible_path(path: &str) -> bool {
    if path.len() < 2 || path.starts_with("//") {
        return false;
    }
    // Division-or-regex artifacts like "/g" or "/i".
    if path.len() == 2 && !path[1..].chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    true
}

/// Extractor for fetched JavaScript bodies.
pub struct JsExtractor {
    target_root: String,
}

impl JsExtractor {
    pub fn new(target_root: &str) -> Self {
        Self {
            target_root: target_root.to_string(),
        }
    }
}

impl Extractor for JsExtractor {
    fn kind(&self) -> ContentKind {
        ContentKind::Js
    }

    fn extract(&self, final_url: &Url, body: &str) -> Result<ExtractedArtifacts, ExtractorError> {
        Ok(mine_script_text(final_url, body, &self.target_root))
    }
}
