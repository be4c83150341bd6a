//! CSS artifact extraction
//!
//! Mines `url()` references, `@import` targets and font sources.
//! Imported stylesheets are also offered as links so a CSS chain can
//! be followed when the static filter allows it.

use super::{absolutize, ContentKind, ExtractedArtifacts, Extractor, ExtractorError};
use crate::types::{Asset, AssetKind};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn url_func_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("static regex"))
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"@import\s+(?:url\(\s*)?['"]([^'"]+)['"]"#).expect("static regex"))
}

pub struct CssExtractor;

impl CssExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CssExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn asset_kind_for(url: &str) -> AssetKind {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "woff" | "woff2" | "ttf" | "otf" | "eot" => AssetKind::Font,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "ico" | "avif" => AssetKind::Image,
        "css" => AssetKind::Stylesheet,
        _ => AssetKind::Other,
    }
}

impl Extractor for CssExtractor {
    fn kind(&self) -> ContentKind {
        ContentKind::Css
    }

    fn extract(&self, final_url: &Url, body: &str) -> Result<ExtractedArtifacts, ExtractorError> {
        let mut artifacts = ExtractedArtifacts::default();

        for caps in import_re().captures_iter(body) {
            if let Some(absolute) = absolutize(final_url, &caps[1]) {
                artifacts.assets.push(Asset {
                    url: absolute.clone(),
                    kind: AssetKind::Stylesheet,
                });
                if !artifacts.links.contains(&absolute) {
                    artifacts.links.push(absolute);
                }
            }
        }

        for caps in url_func_re().captures_iter(body) {
            let reference = &caps[1];
            if reference.starts_with("data:") {
                continue;
            }
            if let Some(absolute) = absolutize(final_url, reference) {
                if artifacts.assets.iter().any(|a| a.url == absolute) {
                    continue;
                }
                artifacts.assets.push(Asset {
                    kind: asset_kind_for(&absolute),
                    url: absolute,
                });
            }
        }

        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(body: &str) -> ExtractedArtifacts {
        let base = Url::parse("https://example.com/css/main.css").unwrap();
        CssExtractor::new().extract(&base, body).unwrap()
    }

    #[test]
    fn test_url_references() {
        let artifacts = extract(
            "body { background: url('/img/bg.png'); }\n\
             @font-face { src: url(\"../fonts/a.woff2\") format('woff2'); }",
        );
        assert_eq!(artifacts.assets.len(), 2);
        assert_eq!(artifacts.assets[0].url, "https://example.com/img/bg.png");
        assert_eq!(artifacts.assets[0].kind, AssetKind::Image);
        assert_eq!(artifacts.assets[1].url, "https://example.com/fonts/a.woff2");
        assert_eq!(artifacts.assets[1].kind, AssetKind::Font);
    }

    #[test]
    fn test_import_becomes_link_and_asset() {
        let artifacts = extract("@import \"theme.css\";\n@import url('print.css');");
        assert_eq!(
            artifacts.links,
            vec![
                "https://example.com/css/theme.css",
                "https://example.com/css/print.css"
            ]
        );
        assert!(artifacts
            .assets
            .iter()
            .all(|a| a.kind == AssetKind::Stylesheet));
    }

    #[test]
    fn test_data_uris_skipped() {
        let artifacts = extract("a { background: url(data:image/png;base64,AAA); }");
        assert!(artifacts.assets.is_empty());
    }

    #[test]
    fn test_unquoted_url() {
        let artifacts = extract("div { background-image: url(/x/y.gif); }");
        assert_eq!(artifacts.assets[0].url, "https://example.com/x/y.gif");
    }
}
