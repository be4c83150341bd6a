//! Logging configuration
//!
//! Picks the tracing subscriber the binary installs: text for
//! terminals, JSON for log shippers, plus the default severity floor.
//! A `RUST_LOG` environment filter overrides both; repeated `-v`
//! flags raise the floor past the configured level.

use serde::{Deserialize, Serialize};

/// Subscriber output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Default severity floor when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_format")]
    pub format: LogFormat,
    #[serde(default = "LoggingConfig::default_level")]
    pub level: LogLevel,
}

impl LoggingConfig {
    fn default_format() -> LogFormat {
        LogFormat::Text
    }

    fn default_level() -> LogLevel {
        LogLevel::Info
    }

    /// EnvFilter directive for the subscriber: the configured level,
    /// raised to debug by one `-v` and trace by two or more.
    pub fn directive(&self, verbose: u8) -> &'static str {
        match (verbose, self.level) {
            (1, _) => "debug",
            (2.., _) => "trace",
            (_, LogLevel::Trace) => "trace",
            (_, LogLevel::Debug) => "debug",
            (_, LogLevel::Info) => "info",
            (_, LogLevel::Warn) => "warn",
            (_, LogLevel::Error) => "error",
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: Self::default_format(),
            level: Self::default_level(),
        }
    }
}
