//! Pattern fuzzer configuration

use serde::{Deserialize, Serialize};

/// Pattern fuzzer configuration. Disabled unless explicitly enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Parameter names tried against parameter-less URLs
    #[serde(default = "default_params")]
    pub params: Vec<String>,
    /// Values tried for each parameter
    #[serde(default = "default_values")]
    pub values: Vec<String>,
    /// Run the smart param validator after enqueueing variants
    #[serde(default = "default_true")]
    pub validate_params: bool,
    /// Fraction of identical consecutive signatures that abandons the
    /// remaining variants
    #[serde(default = "default_identical_threshold")]
    pub identical_threshold: f64,
}

fn default_params() -> Vec<String> {
    ["id", "page", "user", "file", "action"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_values() -> Vec<String> {
    ["1", "2", "admin", "test"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_identical_threshold() -> f64 {
    0.95
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            params: default_params(),
            values: default_values(),
            validate_params: true,
            identical_threshold: default_identical_threshold(),
        }
    }
}
