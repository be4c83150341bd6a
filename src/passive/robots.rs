//! robots.txt parsing
//!
//! Full user-agent group parsing with `*` wildcards and `$` end
//! anchors. Used both as a seed source (Allow/Disallow paths and
//! `Sitemap:` directives) and, when configured, to honor disallow
//! rules during the crawl.

use std::time::Duration;

/// Parsed robots.txt rules for one user agent.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<Duration>,
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Parse a robots.txt body, keeping the group that best matches
    /// `user_agent`. A specific group replaces wildcard rules;
    /// `Sitemap:` directives are global.
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let ua_lower = user_agent.to_ascii_lowercase();
        let mut rules = Self::default();
        let mut group_applies = false;
        let mut found_specific = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    let agent = value.to_ascii_lowercase();
                    if agent == "*" {
                        group_applies = !found_specific;
                    } else if ua_lower.contains(&agent) || agent.contains(&ua_lower) {
                        if !found_specific {
                            // A specific group overrides wildcard rules.
                            rules.disallow.clear();
                            rules.allow.clear();
                            rules.crawl_delay = None;
                        }
                        group_applies = true;
                        found_specific = true;
                    } else {
                        group_applies = false;
                    }
                }
                "disallow" if group_applies && !value.is_empty() => {
                    rules.disallow.push(value.to_string());
                }
                "allow" if group_applies && !value.is_empty() => {
                    rules.allow.push(value.to_string());
                }
                "crawl-delay" if group_applies => {
                    if let Ok(secs) = value.parse::<f64>() {
                        rules.crawl_delay = Some(Duration::from_secs_f64(secs));
                    }
                }
                "sitemap" if !value.is_empty() => {
                    rules.sitemaps.push(value.to_string());
                }
                _ => {}
            }
        }
        rules
    }

    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Longest matching pattern wins; on a tie, allow wins.
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |patterns: &[String]| {
            patterns
                .iter()
                .filter(|p| path_matches(path, p))
                .map(|p| p.len())
                .max()
                .unwrap_or(0)
        };
        longest(&self.allow) >= longest(&self.disallow)
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay
    }

    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Concrete path prefixes worth seeding: every Allow/Disallow
    /// pattern with its wildcard tail and end anchor stripped.
    /// Disallowed paths are prime recon targets.
    pub fn seed_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for pattern in self.disallow.iter().chain(self.allow.iter()) {
            let trimmed = pattern.trim_end_matches('$');
            let concrete = trimmed.split('*').next().unwrap_or("");
            if concrete.len() > 1 && concrete.starts_with('/') && !paths.contains(&concrete.to_string())
            {
                paths.push(concrete.to_string());
            }
        }
        paths
    }
}

/// robots.txt pattern match: prefix semantics with `*` wildcards and
/// an optional `$` end anchor.
fn path_matches(path: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        let mut pos = 0;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            match path[pos..].find(part) {
                Some(found) if i > 0 || found == 0 => pos += found + part.len(),
                _ => return false,
            }
        }
        return !anchored || pos == path.len() || parts.last() == Some(&"");
    }

    if anchored {
        path == pattern
    } else {
        path.starts_with(pattern)
    }
}
