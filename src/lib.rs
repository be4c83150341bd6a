//! siterecon: single-target web reconnaissance crawler.
//!
//! The pipeline runs URL canonicalization, scope checks and a
//! three-layer dedup stack in front of a priority frontier whose
//! weights are retuned by an adaptive learner. Passive sources seed
//! the frontier before the first fetch; a pattern fuzzer probes
//! parameter handling on the way; results stream to pluggable sinks
//! with periodic checkpoints for resume.

pub mod canonical;
pub mod config;
pub mod crawler;
pub mod dedup;
pub mod driver;
pub mod emit;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod fuzz;
pub mod harvest;
pub mod learner;
pub mod passive;
pub mod pool;
pub mod scope;
pub mod stats;
pub mod types;
pub mod util;

pub use config::Config;
pub use crawler::{CrawlHandle, CrawlReport, Crawler, CrawlerError};
pub use emit::{CheckpointManager, CrawlEvent, CrawlState, CrawlStatus};
pub use types::{PageResult, Summary};
