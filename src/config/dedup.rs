//! Deduplication configuration

use serde::{Deserialize, Serialize};

/// Deduplication stack configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Expected number of distinct URLs, sizes the Bloom pre-filter
    #[serde(default = "default_expected_urls")]
    pub expected_urls: usize,
    /// Bloom filter false positive rate
    #[serde(default = "default_bloom_fpp")]
    pub bloom_false_positive_rate: f64,
    /// Sample URLs retained per structural pattern
    #[serde(default = "default_pattern_samples")]
    pub pattern_samples: usize,
    /// DOM embedding dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Cosine similarity at or above which a page is a near-duplicate
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Maximum stored page embeddings compared against
    #[serde(default = "default_max_embeddings")]
    pub max_embeddings: usize,
}

fn default_expected_urls() -> usize {
    1_000_000
}

fn default_bloom_fpp() -> f64 {
    0.01
}

fn default_pattern_samples() -> usize {
    5
}

fn default_embedding_dim() -> usize {
    256
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_max_embeddings() -> usize {
    10_000
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            expected_urls: default_expected_urls(),
            bloom_false_positive_rate: default_bloom_fpp(),
            pattern_samples: default_pattern_samples(),
            embedding_dim: default_embedding_dim(),
            similarity_threshold: default_similarity_threshold(),
            max_embeddings: default_max_embeddings(),
        }
    }
}
