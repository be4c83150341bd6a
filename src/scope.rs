//! Crawl scope engine
//!
//! Decides whether a canonical URL belongs to the crawl. Filters are
//! evaluated in a fixed order, first match wins: blacklist, static
//! asset filter, host mode, then path globs / query rules / depth
//! ceiling. JavaScript URLs bypass the host mode check (cross-origin
//! JS on CDNs carries endpoint strings for the target) but still
//! honor the blacklist.

use crate::canonical::CanonicalUrl;
use crate::config::{ScopeConfig, ScopeMode};
use regex::Regex;
use thiserror::Error;

/// Extensions treated as static assets when the filter is enabled.
const STATIC_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "avif", "css", "woff", "woff2",
    "ttf", "otf", "eot", "mp4", "mp3", "wav", "webm", "ogg", "avi", "mov", "pdf", "doc", "docx",
    "xls", "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "rar", "7z", "exe", "dmg", "iso",
];

/// Content-Type prefixes treated as static.
const STATIC_CONTENT_TYPE_PREFIXES: &[&str] = &["image/", "video/", "audio/", "font/"];

/// Second-level suffixes that are themselves public registries, so the
/// registrable domain is three labels instead of two.
const MULTI_PART_TLDS: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "com.au", "net.au", "org.au", "co.jp", "or.jp",
    "ne.jp", "co.nz", "co.za", "com.br", "com.cn", "com.mx", "com.tr", "co.in", "co.kr",
];

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("invalid blacklist pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Why a URL was rejected, or that it was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecision {
    InScope,
    Blacklisted,
    StaticAsset,
    OutOfScopeHost,
    ExcludedPath,
    NotIncludedPath,
    QueryNotAllowed,
    TooDeep,
}

impl ScopeDecision {
    pub fn is_in_scope(&self) -> bool {
        matches!(self, Self::InScope)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::InScope => "in scope",
            Self::Blacklisted => "blacklisted",
            Self::StaticAsset => "static asset",
            Self::OutOfScopeHost => "out-of-scope host",
            Self::ExcludedPath => "excluded path",
            Self::NotIncludedPath => "path not in include list",
            Self::QueryNotAllowed => "query parameters not allowed",
            Self::TooDeep => "depth ceiling",
        }
    }
}

/// Compiled scope rules for one target.
pub struct ScopeEngine {
    mode: ScopeMode,
    target_host: String,
    target_root: String,
    blacklist_hosts: Vec<String>,
    blacklist_regexes: Vec<Regex>,
    include_globs: Vec<Regex>,
    exclude_globs: Vec<Regex>,
    filter_static_assets: bool,
    skip_query_urls: bool,
    max_depth: usize,
}

impl ScopeEngine {
    pub fn new(
        config: &ScopeConfig,
        target_host: &str,
        max_depth: usize,
    ) -> Result<Self, ScopeError> {
        let blacklist_regexes = config
            .blacklist_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| ScopeError::InvalidPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let compile_globs = |globs: &[String]| -> Result<Vec<Regex>, ScopeError> {
            globs
                .iter()
                .map(|g| {
                    let pattern = glob_to_regex(g);
                    Regex::new(&pattern).map_err(|source| ScopeError::InvalidPattern {
                        pattern: g.clone(),
                        source,
                    })
                })
                .collect()
        };

        let target_host = target_host.to_ascii_lowercase();
        let target_root = registrable_domain(&target_host);

        Ok(Self {
            mode: config.mode,
            target_host,
            target_root,
            blacklist_hosts: config
                .blacklist_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            blacklist_regexes,
            include_globs: compile_globs(&config.include_globs)?,
            exclude_globs: compile_globs(&config.exclude_globs)?,
            filter_static_assets: config.filter_static_assets,
            skip_query_urls: config.skip_query_urls,
            max_depth,
        })
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    /// Evaluate all scope rules against a URL at a given depth.
    pub fn check(&self, url: &CanonicalUrl, depth: usize) -> ScopeDecision {
        if self.is_blacklisted(url) {
            return ScopeDecision::Blacklisted;
        }

        let is_js = url.is_javascript();

        if self.filter_static_assets && !is_js && self.is_static_extension(url) {
            return ScopeDecision::StaticAsset;
        }

        // Cross-origin JS is analyzed for endpoint strings, so it
        // skips the host mode check.
        if !is_js && !self.host_in_scope(url.host()) {
            return ScopeDecision::OutOfScopeHost;
        }

        if self
            .exclude_globs
            .iter()
            .any(|re| re.is_match(url.path()))
        {
            return ScopeDecision::ExcludedPath;
        }
        if !self.include_globs.is_empty()
            && !self.include_globs.iter().any(|re| re.is_match(url.path()))
        {
            return ScopeDecision::NotIncludedPath;
        }

        if self.skip_query_urls && url.has_params() {
            return ScopeDecision::QueryNotAllowed;
        }

        if depth > self.max_depth {
            return ScopeDecision::TooDeep;
        }

        ScopeDecision::InScope
    }

    /// Static classification from a Content-Type header, used by the
    /// driver after fetch.
    pub fn is_static_content_type(content_type: &str) -> bool {
        let lower = content_type.to_ascii_lowercase();
        STATIC_CONTENT_TYPE_PREFIXES
            .iter()
            .any(|p| lower.starts_with(p))
    }

    /// Whether a host belongs to the target under the configured mode.
    pub fn host_in_scope(&self, host: &str) -> bool {
        match self.mode {
            ScopeMode::All => true,
            ScopeMode::Strict => host == self.target_host,
            ScopeMode::Sub => {
                host == self.target_host || host.ends_with(&format!(".{}", self.target_host))
            }
            ScopeMode::Rdn => registrable_domain(host) == self.target_root,
        }
    }

    fn is_blacklisted(&self, url: &CanonicalUrl) -> bool {
        let host = url.host();
        if self
            .blacklist_hosts
            .iter()
            .any(|b| host == b || host.ends_with(&format!(".{b}")))
        {
            return true;
        }
        self.blacklist_regexes
            .iter()
            .any(|re| re.is_match(url.as_str()))
    }

    fn is_static_extension(&self, url: &CanonicalUrl) -> bool {
        url.extension()
            .map(|ext| STATIC_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// Registrable domain of a host: the last two labels, or three when
/// the suffix is a multi-part public registry like `co.uk`. IP
/// addresses are returned whole.
pub fn registrable_domain(host: &str) -> String {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host.to_string();
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host.to_string();
    }
    let last_two = labels[labels.len() - 2..].join(".");
    let take = if MULTI_PART_TLDS.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    labels[labels.len().saturating_sub(take)..].join(".")
}

/// Convert a path glob (`*`, `**`, `?`) into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            c if "\\.+()[]{}|^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}
