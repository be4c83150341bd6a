//! Frontier priority scoring
//!
//! The score of a frontier entry is a weighted sum computed at push
//! time. Weights start from fixed defaults and may be retuned by the
//! adaptive learner; readers always see a consistent snapshot because
//! the whole vector is replaced atomically.

use serde::{Deserialize, Serialize};

pub const WEIGHT_MIN: f64 = 0.1;
pub const WEIGHT_MAX: f64 = 100.0;

/// Scoring weights. Replaced as a whole by the learner, never mutated
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub w_depth: f64,
    pub w_internal: f64,
    pub w_params: f64,
    pub w_recent: f64,
    pub w_path_value: f64,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            w_depth: 3.0,
            w_internal: 2.0,
            w_params: 1.5,
            w_recent: 1.0,
            w_path_value: 4.0,
        }
    }
}

impl WeightVector {
    /// Clamp every component into the allowed band.
    pub fn clamped(mut self) -> Self {
        self.w_depth = self.w_depth.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.w_internal = self.w_internal.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.w_params = self.w_params.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.w_recent = self.w_recent.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.w_path_value = self.w_path_value.clamp(WEIGHT_MIN, WEIGHT_MAX);
        self
    }

    /// Compute the priority score for an entry's attributes.
    pub fn score(&self, depth: usize, is_internal: bool, param_count: usize, path: &str) -> f64 {
        self.w_depth * (1.0 / depth.max(1) as f64)
            + self.w_internal * if is_internal { 1.0 } else { 0.0 }
            + self.w_params * params_bonus(param_count)
            + self.w_recent * 0.5
            + self.w_path_value * path_value(path)
    }
}

/// Diminishing-step bonus for parameterized URLs.
pub fn params_bonus(param_count: usize) -> f64 {
    match param_count {
        0 => 0.0,
        1 => 1.0,
        2 => 1.5,
        _ => 2.0,
    }
}

const HIGH_VALUE_KEYWORDS: &[&str] = &[
    "admin",
    "phpmyadmin",
    ".env",
    "config",
    "backup",
    ".git",
    "secret",
    "private",
    "internal",
    "debug",
    "console",
    "manage",
];

const API_VALUE_KEYWORDS: &[&str] = &[
    "api", "graphql", "upload", "dashboard", "auth", "token", "oauth", "webhook", "ajax", "rest",
];

const MID_VALUE_KEYWORDS: &[&str] = &[
    "search", "register", "cart", "login", "account", "profile", "checkout", "order", "user",
];

const LOW_VALUE_KEYWORDS: &[&str] = &[
    "about", "help", "faq", "terms", "privacy", "contact", "images/", "css/", "fonts/", "static/",
    "assets/", "blog", "news",
];

/// Keyword-table lookup on the path, case-insensitive substring match,
/// highest tier wins.
pub fn path_value(path: &str) -> f64 {
    let lower = path.to_ascii_lowercase();
    if HIGH_VALUE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return 3.0;
    }
    if API_VALUE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return 2.0;
    }
    if MID_VALUE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return 1.0;
    }
    if LOW_VALUE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return 0.3;
    }
    0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let w = WeightVector::default();
        assert_eq!(w.w_depth, 3.0);
        assert_eq!(w.w_internal, 2.0);
        assert_eq!(w.w_params, 1.5);
        assert_eq!(w.w_recent, 1.0);
        assert_eq!(w.w_path_value, 4.0);
    }

    #[test]
    fn test_params_bonus_steps() {
        assert_eq!(params_bonus(0), 0.0);
        assert_eq!(params_bonus(1), 1.0);
        assert_eq!(params_bonus(2), 1.5);
        assert_eq!(params_bonus(3), 2.0);
        assert_eq!(params_bonus(9), 2.0);
    }

    #[test]
    fn test_path_value_tiers() {
        assert_eq!(path_value("/admin/panel"), 3.0);
        assert_eq!(path_value("/.env"), 3.0);
        assert_eq!(path_value("/api/v1/users"), 2.0);
        assert_eq!(path_value("/graphql"), 2.0);
        assert_eq!(path_value("/search"), 1.0);
        assert_eq!(path_value("/about"), 0.3);
        assert_eq!(path_value("/images/logo"), 0.3);
        assert_eq!(path_value("/products"), 0.5);
    }

    #[test]
    fn test_path_value_case_insensitive() {
        assert_eq!(path_value("/Admin/Panel"), 3.0);
        assert_eq!(path_value("/API/v2"), 2.0);
    }

    #[test]
    fn test_highest_tier_wins() {
        // Contains both "admin" (3.0) and "api" (2.0).
        assert_eq!(path_value("/api/admin"), 3.0);
    }

    #[test]
    fn test_score_formula() {
        let w = WeightVector::default();
        // depth 1, internal, no params, default path value:
        // 3.0*1 + 2.0 + 0 + 1.0*0.5 + 4.0*0.5 = 7.5
        let score = w.score(1, true, 0, "/products");
        assert!((score - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_depth_zero_treated_as_one() {
        let w = WeightVector::default();
        assert_eq!(w.score(0, false, 0, "/x"), w.score(1, false, 0, "/x"));
    }

    #[test]
    fn test_clamp_bounds() {
        let w = WeightVector {
            w_depth: 0.0001,
            w_internal: 500.0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(w.w_depth, WEIGHT_MIN);
        assert_eq!(w.w_internal, WEIGHT_MAX);
    }
}
