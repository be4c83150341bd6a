//! Output and checkpoint configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File sink formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    Jsonl,
    Csv,
    Text,
    Html,
}

/// Output configuration: sink files, flush cadence, checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving sink files and checkpoints
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Enabled sink formats
    #[serde(default = "default_formats")]
    pub formats: Vec<SinkFormat>,
    /// Flush sink buffers after this many entries
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
    /// Flush sink buffers at least this often, in seconds
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Checkpoint save interval in seconds
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,
    /// Bounded capacity of each sink's queue
    #[serde(default = "default_sink_queue_capacity")]
    pub sink_queue_capacity: usize,
    /// Include response bodies in the JSONL sink
    #[serde(default)]
    pub include_body: bool,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("siterecon-out")
}

fn default_formats() -> Vec<SinkFormat> {
    vec![
        SinkFormat::Jsonl,
        SinkFormat::Csv,
        SinkFormat::Text,
        SinkFormat::Html,
    ]
}

fn default_flush_every() -> usize {
    50
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_checkpoint_interval_secs() -> u64 {
    30
}

fn default_sink_queue_capacity() -> usize {
    1024
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            formats: default_formats(),
            flush_every: default_flush_every(),
            flush_interval_secs: default_flush_interval_secs(),
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
            sink_queue_capacity: default_sink_queue_capacity(),
            include_body: false,
        }
    }
}

impl OutputConfig {
    /// Directory holding `{task_id}_checkpoint.json` files.
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.out_dir.join("checkpoints")
    }
}
