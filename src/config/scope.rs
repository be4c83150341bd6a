//! Scope configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host scope mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Exact host match only
    Strict,
    /// Target host and its subdomains
    Sub,
    /// Same registrable domain
    Rdn,
    /// Any host
    All,
}

impl ScopeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Sub => "sub",
            Self::Rdn => "rdn",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScopeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "sub" => Ok(Self::Sub),
            "rdn" => Ok(Self::Rdn),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown scope mode '{other}' (expected strict|sub|rdn|all)"
            )),
        }
    }
}

/// Scope engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Host mode applied to non-JS URLs
    #[serde(default = "default_mode")]
    pub mode: ScopeMode,
    /// Hosts rejected unconditionally (exact or `.suffix` match)
    #[serde(default)]
    pub blacklist_hosts: Vec<String>,
    /// Regex patterns rejected unconditionally
    #[serde(default)]
    pub blacklist_patterns: Vec<String>,
    /// Path glob patterns; when non-empty, a URL must match one
    #[serde(default)]
    pub include_globs: Vec<String>,
    /// Path glob patterns rejected
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Reject static assets by extension/content type
    #[serde(default = "default_true")]
    pub filter_static_assets: bool,
    /// Reject URLs carrying query parameters
    #[serde(default)]
    pub skip_query_urls: bool,
}

fn default_mode() -> ScopeMode {
    ScopeMode::Sub
}

fn default_true() -> bool {
    true
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            blacklist_hosts: Vec::new(),
            blacklist_patterns: Vec::new(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            filter_static_assets: true,
            skip_query_urls: false,
        }
    }
}
