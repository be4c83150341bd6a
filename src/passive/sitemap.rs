//! Sitemap XML parsing
//!
//! Streams `<urlset>` and `<sitemapindex>` documents. Nested sitemaps
//! from an index are returned separately so the ingestor can follow
//! them breadth-first with a file-count ceiling.

use super::PassiveError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// One parsed sitemap file.
#[derive(Debug, Clone, Default)]
pub struct SitemapDocument {
    /// Page URLs from `<urlset><url><loc>`.
    pub urls: Vec<String>,
    /// Nested sitemap URLs from `<sitemapindex><sitemap><loc>`.
    pub nested: Vec<String>,
}

/// Parse one sitemap or sitemap-index body.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, PassiveError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut document = SitemapDocument::default();
    let mut in_nested_entry = false;
    let mut in_loc = false;
    let mut text_buf = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"sitemap" => in_nested_entry = true,
                b"url" => in_nested_entry = false,
                b"loc" => {
                    in_loc = true;
                    text_buf.clear();
                }
                _ => {}
            },
            Event::Text(ref e) => {
                if in_loc {
                    if let Ok(text) = e.unescape() {
                        text_buf.push_str(&text);
                    }
                }
            }
            Event::CData(ref e) => {
                if in_loc {
                    text_buf.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"loc" => {
                    in_loc = false;
                    let loc = text_buf.trim().to_string();
                    if !loc.is_empty() {
                        if in_nested_entry {
                            document.nested.push(loc);
                        } else {
                            document.urls.push(loc);
                        }
                    }
                }
                b"sitemap" => in_nested_entry = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc>https://example.com/about</loc></url>
</urlset>"#;
        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(
            doc.urls,
            vec!["https://example.com/", "https://example.com/about"]
        );
        assert!(doc.nested.is_empty());
    }

    #[test]
    fn test_sitemap_index() {
        let xml = r#"<sitemapindex>
  <sitemap><loc>https://example.com/sitemap-pages.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-posts.xml</loc></sitemap>
</sitemapindex>"#;
        let doc = parse_sitemap(xml).unwrap();
        assert!(doc.urls.is_empty());
        assert_eq!(doc.nested.len(), 2);
        assert_eq!(doc.nested[0], "https://example.com/sitemap-pages.xml");
    }

    #[test]
    fn test_cdata_and_entities() {
        let xml = r#"<urlset>
  <url><loc><![CDATA[https://example.com/x?a=1&b=2]]></loc></url>
  <url><loc>https://example.com/y?a=1&amp;b=2</loc></url>
</urlset>"#;
        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(doc.urls[0], "https://example.com/x?a=1&b=2");
        assert_eq!(doc.urls[1], "https://example.com/y?a=1&b=2");
    }

    #[test]
    fn test_empty_document() {
        let doc = parse_sitemap("<urlset></urlset>").unwrap();
        assert!(doc.urls.is_empty());
    }
}
