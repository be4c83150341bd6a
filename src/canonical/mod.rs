//! URL canonicalization
//!
//! Reduces a raw URL to a canonical form used as the equality key
//! throughout the crawler:
//! - lowercased scheme and host (IDN hosts converted to punycode)
//! - default ports stripped
//! - path cleaned (`.`/`..` resolved, duplicate slashes collapsed)
//! - percent-encoding normalized (unreserved decoded, rest uppercased)
//! - tracking query parameters stripped, remaining pairs sorted
//! - fragment dropped
//!
//! Canonicalization is pure: no I/O, no shared state.

pub mod validator;

pub use validator::{SmartUrlValidator, ValidatorConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Query parameters stripped during canonicalization. Keys starting
/// with `utm_` are stripped regardless of this list.
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "gclid",
    "fbclid",
    "msclkid",
    "dclid",
    "yclid",
    "igshid",
    "mc_cid",
    "mc_eid",
    "_ga",
    "_gl",
    "ref_src",
    "spm",
];

/// Errors produced while canonicalizing a raw URL.
#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("URL parse error: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme '{0}' (only http/https)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    EmptyHost,
}

/// URL scheme accepted by the crawler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// A canonicalized URL. Built once by [`canonicalize`]; immutable.
///
/// The serialized form is cached so equality and hashing are cheap
/// string operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalUrl {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    path: String,
    query: Vec<(String, String)>,
    serialized: String,
}

impl CanonicalUrl {
    /// The cached canonical string form.
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Lowercased punycode host, never empty.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit non-default port, if any.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Cleaned path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Sorted query pairs (decoded).
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn has_params(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn param_count(&self) -> usize {
        self.query.len()
    }

    /// Lowercased extension of the final path segment, without the dot.
    pub fn extension(&self) -> Option<String> {
        let segment = self.path.rsplit('/').next()?;
        let (_, ext) = segment.rsplit_once('.')?;
        if ext.is_empty() || ext.len() > 8 {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Whether this URL points at a JavaScript source file.
    pub fn is_javascript(&self) -> bool {
        matches!(self.extension().as_deref(), Some("js" | "mjs" | "jsx"))
    }

    /// Rebuild a `url::Url` for fetch-time use.
    pub fn to_url(&self) -> Url {
        Url::parse(&self.serialized).expect("canonical form is a valid URL")
    }
}

impl PartialEq for CanonicalUrl {
    fn eq(&self, other: &Self) -> bool {
        self.serialized == other.serialized
    }
}

impl Eq for CanonicalUrl {}

impl std::hash::Hash for CanonicalUrl {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.serialized.hash(state);
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}

/// Canonicalize a raw URL string with the default tracking-param list.
pub fn canonicalize(raw: &str) -> Result<CanonicalUrl, CanonicalError> {
    canonicalize_with(raw, DEFAULT_TRACKING_PARAMS)
}

/// Canonicalize with an explicit tracking-param list.
pub fn canonicalize_with(
    raw: &str,
    tracking_params: &[&str],
) -> Result<CanonicalUrl, CanonicalError> {
    let parsed = Url::parse(raw.trim())?;
    canonicalize_url(&parsed, tracking_params)
}

/// Canonicalize an already-parsed URL.
pub fn canonicalize_url(
    parsed: &Url,
    tracking_params: &[&str],
) -> Result<CanonicalUrl, CanonicalError> {
    let scheme = match parsed.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => return Err(CanonicalError::UnsupportedScheme(other.to_string())),
    };

    // The url crate already lowercases the host and converts IDN
    // hosts to punycode during parsing.
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(CanonicalError::EmptyHost)?
        .to_ascii_lowercase();

    let port = parsed.port().filter(|&p| p != scheme.default_port());

    let path = clean_path(parsed.path());

    let mut query: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key, tracking_params))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    // Sorting pairs orders keys lexicographically and, for repeated
    // keys, orders their values too.
    query.sort();

    let serialized = serialize(scheme, &host, port, &path, &query);

    Ok(CanonicalUrl {
        scheme,
        host,
        port,
        path,
        query,
        serialized,
    })
}

fn is_tracking_param(key: &str, tracking_params: &[&str]) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("utm_") || tracking_params.contains(&lower.as_str())
}

/// Resolve `.`/`..`, collapse duplicate slashes, normalize
/// percent-encoding per segment. Keeps the leading slash and any
/// trailing slash.
fn clean_path(path: &str) -> String {
    let had_trailing_slash = path.len() > 1 && path.ends_with('/');

    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(normalize_percent(other)),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut cleaned = String::with_capacity(path.len());
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    if had_trailing_slash {
        cleaned.push('/');
    }
    cleaned
}

/// RFC 3986 unreserved characters.
fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Decode percent-sequences that encode unreserved characters and
/// uppercase the hex digits of the rest.
fn normalize_percent(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(segment.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                let decoded = (hi * 16 + lo) as u8;
                if is_unreserved(decoded) {
                    out.push(decoded as char);
                } else {
                    out.push('%');
                    out.push(char::from_digit(hi, 16).unwrap().to_ascii_uppercase());
                    out.push(char::from_digit(lo, 16).unwrap().to_ascii_uppercase());
                }
                i += 3;
                continue;
            }
        }
        // Multi-byte UTF-8 is copied through untouched.
        let ch_len = utf8_len(bytes[i]);
        let end = (i + ch_len).min(bytes.len());
        out.push_str(&segment[i..end]);
        i = end;
    }
    out
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        b if b >= 0xC0 => 2,
        _ => 1,
    }
}

fn serialize(
    scheme: Scheme,
    host: &str,
    port: Option<u16>,
    path: &str,
    query: &[(String, String)],
) -> String {
    let mut out = String::with_capacity(host.len() + path.len() + 16);
    out.push_str(scheme.as_str());
    out.push_str("://");
    out.push_str(host);
    if let Some(port) = port {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(path);
    if !query.is_empty() {
        out.push('?');
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in query {
            serializer.append_pair(key, value);
        }
        out.push_str(&serializer.finish());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_canonicalization() {
        // Scenario: uppercase scheme/host, default port, dot segments,
        // tracking params, unsorted query, fragment.
        let canon =
            canonicalize("HTTP://Example.COM:80/a/./b/../c/?utm_source=x&b=2&a=1#frag").unwrap();
        assert_eq!(canon.as_str(), "http://example.com/a/c/?a=1&b=2");
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "HTTP://Example.COM:80/a/./b/../c/?utm_source=x&b=2&a=1#frag",
            "https://example.com//double//slash/",
            "https://example.com/p?x=hello%20world&a=1",
            "https://example.com/%7Euser/%2fescaped",
        ];
        for input in inputs {
            let first = canonicalize(input).unwrap();
            let second = canonicalize(first.as_str()).unwrap();
            assert_eq!(first, second, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_case_and_port_equivalence() {
        let a = canonicalize("https://EXAMPLE.com:443/path").unwrap();
        let b = canonicalize("https://example.com/path").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_ordering_equivalence() {
        let a = canonicalize("https://example.com/?b=2&a=1").unwrap();
        let b = canonicalize("https://example.com/?a=1&b=2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tracking_params_equivalence() {
        let a = canonicalize("https://example.com/p?id=5&utm_campaign=x&gclid=abc").unwrap();
        let b = canonicalize("https://example.com/p?id=5").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_multi_valued_keys_sorted() {
        let canon = canonicalize("https://example.com/?k=b&k=a").unwrap();
        assert_eq!(canon.as_str(), "https://example.com/?k=a&k=b");
    }

    #[test]
    fn test_non_default_port_kept() {
        let canon = canonicalize("http://example.com:8080/x").unwrap();
        assert_eq!(canon.port(), Some(8080));
        assert_eq!(canon.as_str(), "http://example.com:8080/x");
    }

    #[test]
    fn test_duplicate_slashes_collapsed() {
        let canon = canonicalize("https://example.com//a///b/").unwrap();
        assert_eq!(canon.path(), "/a/b/");
    }

    #[test]
    fn test_percent_normalization() {
        // %7E encodes '~' (unreserved, decode); %2f encodes '/'
        // (reserved, uppercase).
        let canon = canonicalize("https://example.com/%7Euser/a%2fb").unwrap();
        assert_eq!(canon.path(), "/~user/a%2Fb");
    }

    #[test]
    fn test_truncated_percent_sequence_copied_through() {
        assert_eq!(normalize_percent("a%4"), "a%4");
        assert_eq!(normalize_percent("a%"), "a%");
        assert_eq!(normalize_percent("%41"), "A");
    }

    #[test]
    fn test_idn_host_punycode() {
        let canon = canonicalize("https://bücher.example/x").unwrap();
        assert_eq!(canon.host(), "xn--bcher-kva.example");
    }

    #[test]
    fn test_rejects_non_http() {
        assert!(matches!(
            canonicalize("ftp://example.com/file"),
            Err(CanonicalError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            canonicalize("javascript:alert(1)"),
            Err(CanonicalError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_extension_and_js_detection() {
        let js = canonicalize("https://cdn.example.com/app.min.JS").unwrap();
        assert_eq!(js.extension().as_deref(), Some("js"));
        assert!(js.is_javascript());

        let page = canonicalize("https://example.com/about").unwrap();
        assert_eq!(page.extension(), None);
        assert!(!page.is_javascript());
    }

    #[test]
    fn test_dot_dot_does_not_escape_root() {
        let canon = canonicalize("https://example.com/../../etc/passwd").unwrap();
        assert_eq!(canon.path(), "/etc/passwd");
    }
}
