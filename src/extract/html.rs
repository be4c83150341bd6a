//! HTML artifact extraction
//!
//! Mines anchors, forms with their fields, script/link/img
//! references, and inline scripts (handed to the JS miner). All
//! references are absolutized against the final URL.

use super::{absolutize, subdomain_of, ContentKind, ExtractedArtifacts, Extractor, ExtractorError};
use crate::extract::js::mine_script_text;
use crate::types::{Asset, AssetKind, Form, FormField};
use scraper::{Html, Selector};
use url::Url;

pub struct HtmlExtractor {
    target_root: String,
    anchors: Selector,
    forms: Selector,
    form_fields: Selector,
    scripts: Selector,
    links: Selector,
    images: Selector,
    iframes: Selector,
    title: Selector,
}

impl HtmlExtractor {
    pub fn new(target_root: &str) -> Self {
        // Selector parsing of these literals cannot fail.
        let sel = |s: &str| Selector::parse(s).expect("static selector");
        Self {
            target_root: target_root.to_string(),
            anchors: sel("a[href]"),
            forms: sel("form"),
            form_fields: sel("input, select, textarea"),
            scripts: sel("script"),
            links: sel("link[href]"),
            images: sel("img[src]"),
            iframes: sel("iframe[src]"),
            title: sel("title"),
        }
    }

    fn note_subdomain(&self, artifacts: &mut ExtractedArtifacts, absolute: &str) {
        if let Ok(parsed) = Url::parse(absolute) {
            if let Some(host) = parsed.host_str() {
                if let Some(sub) = subdomain_of(host, &self.target_root) {
                    if !artifacts.subdomains.contains(&sub) {
                        artifacts.subdomains.push(sub);
                    }
                }
            }
        }
    }
}

impl Extractor for HtmlExtractor {
    fn kind(&self) -> ContentKind {
        ContentKind::Html
    }

    fn extract(&self, final_url: &Url, body: &str) -> Result<ExtractedArtifacts, ExtractorError> {
        let document = Html::parse_document(body);
        let mut artifacts = ExtractedArtifacts::default();

        artifacts.title = document
            .select(&self.title)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        for anchor in document.select(&self.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(absolute) = absolutize(final_url, href) {
                self.note_subdomain(&mut artifacts, &absolute);
                artifacts.links.push(absolute);
            }
        }

        for form in document.select(&self.forms) {
            let action = form.value().attr("action").unwrap_or("");
            let Some(action_url) = absolutize(final_url, action)
                .or_else(|| Some(final_url.to_string()))
            else {
                continue;
            };
            let method = form
                .value()
                .attr("method")
                .unwrap_or("GET")
                .to_ascii_uppercase();
            let fields = form
                .select(&self.form_fields)
                .filter_map(|field| {
                    let name = field.value().attr("name")?.to_string();
                    Some(FormField {
                        name,
                        field_type: field
                            .value()
                            .attr("type")
                            .unwrap_or("text")
                            .to_ascii_lowercase(),
                        value: field.value().attr("value").map(str::to_string),
                        required: field.value().attr("required").is_some(),
                    })
                })
                .collect();
            artifacts.links.push(action_url.clone());
            artifacts.forms.push(Form {
                action: action_url,
                method,
                fields,
            });
        }

        for script in document.select(&self.scripts) {
            match script.value().attr("src") {
                Some(src) => {
                    if let Some(absolute) = absolutize(final_url, src) {
                        self.note_subdomain(&mut artifacts, &absolute);
                        artifacts.assets.push(Asset {
                            url: absolute.clone(),
                            kind: AssetKind::Script,
                        });
                        artifacts.links.push(absolute);
                    }
                }
                None => {
                    // Inline script: run the JS miner over its text.
                    let text: String = script.text().collect();
                    if !text.trim().is_empty() {
                        let mined = mine_script_text(final_url, &text, &self.target_root);
                        artifacts.merge(mined);
                    }
                }
            }
        }

        for link in document.select(&self.links) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(absolute) = absolutize(final_url, href) else {
                continue;
            };
            let rel = link.value().attr("rel").unwrap_or("").to_ascii_lowercase();
            let kind = if rel.contains("stylesheet") {
                AssetKind::Stylesheet
            } else if rel.contains("icon") {
                AssetKind::Image
            } else {
                AssetKind::Other
            };
            artifacts.assets.push(Asset {
                url: absolute.clone(),
                kind,
            });
            artifacts.links.push(absolute);
        }

        for image in document.select(&self.images) {
            if let Some(absolute) =
                image.value().attr("src").and_then(|s| absolutize(final_url, s))
            {
                artifacts.assets.push(Asset {
                    url: absolute,
                    kind: AssetKind::Image,
                });
            }
        }

        for iframe in document.select(&self.iframes) {
            if let Some(absolute) =
                iframe.value().attr("src").and_then(|s| absolutize(final_url, s))
            {
                artifacts.links.push(absolute);
            }
        }

        Ok(artifacts)
    }
}
