//! Burp Suite XML import
//!
//! Reads a Burp sitemap/proxy export: root `<items>`, one `<item>` per
//! captured request with `<url>` and `<method>` children. Only those
//! two fields are required; everything else is ignored.

use super::PassiveError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs;
use std::path::Path;

/// One captured request from a Burp export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurpItem {
    pub url: String,
    pub method: String,
}

pub fn parse_burp_file(path: &Path) -> Result<Vec<BurpItem>, PassiveError> {
    let content = fs::read_to_string(path)?;
    parse_burp_xml(&content)
}

pub fn parse_burp_xml(xml: &str) -> Result<Vec<BurpItem>, PassiveError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut url: Option<String> = None;
    let mut method: Option<String> = None;
    let mut current: Option<&'static str> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"item" => {
                    url = None;
                    method = None;
                }
                b"url" => {
                    current = Some("url");
                    text_buf.clear();
                }
                b"method" => {
                    current = Some("method");
                    text_buf.clear();
                }
                _ => current = None,
            },
            Event::Text(ref e) => {
                if current.is_some() {
                    if let Ok(text) = e.unescape() {
                        text_buf.push_str(&text);
                    }
                }
            }
            Event::CData(ref e) => {
                if current.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"url" => {
                    url = Some(text_buf.trim().to_string());
                    current = None;
                }
                b"method" => {
                    method = Some(text_buf.trim().to_ascii_uppercase());
                    current = None;
                }
                b"item" => {
                    if let Some(url) = url.take() {
                        if !url.is_empty() {
                            items.push(BurpItem {
                                url,
                                method: method.take().unwrap_or_else(|| "GET".to_string()),
                            });
                        }
                    }
                    method = None;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(items)
}
