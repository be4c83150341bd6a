//! Exact-URL visited set
//!
//! A Bloom filter answers the common "definitely new" case without
//! touching the exact set; membership claims are confirmed against a
//! hash set so the structure never loses recall.

use crate::util::fast_hash;
use std::collections::HashSet;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Fixed-size Bloom filter over u64 bitset words.
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: u32,
}

impl BloomFilter {
    /// Size the filter for an expected item count and false positive
    /// rate.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let ln2 = std::f64::consts::LN_2;
        let num_bits = ((-n * false_positive_rate.ln()) / (ln2 * ln2)).ceil() as usize;
        let num_bits = num_bits.max(64);
        let num_hashes = (((num_bits as f64 / n) * ln2).round() as u32).clamp(1, 16);
        Self {
            bits: vec![0u64; num_bits.div_ceil(64)],
            num_bits,
            num_hashes,
        }
    }

    pub fn insert(&mut self, key: &str) {
        for seed in 0..self.num_hashes {
            let bit = self.bit_index(key, seed);
            self.bits[bit / 64] |= 1u64 << (bit % 64);
        }
    }

    /// May return false positives, never false negatives.
    pub fn contains(&self, key: &str) -> bool {
        (0..self.num_hashes).all(|seed| {
            let bit = self.bit_index(key, seed);
            self.bits[bit / 64] & (1u64 << (bit % 64)) != 0
        })
    }

    fn bit_index(&self, key: &str, seed: u32) -> usize {
        (xxh3_64_with_seed(key.as_bytes(), seed as u64) % self.num_bits as u64) as usize
    }
}

/// Visited set keyed on the canonical URL string.
pub struct VisitedSet {
    bloom: BloomFilter,
    confirmed: HashSet<u64>,
}

impl VisitedSet {
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        Self {
            bloom: BloomFilter::new(expected_items, false_positive_rate),
            confirmed: HashSet::new(),
        }
    }

    /// Record a URL as visited. Returns true when the URL was new.
    pub fn insert(&mut self, canonical: &str) -> bool {
        let hash = fast_hash(canonical);
        if self.bloom.contains(canonical) && self.confirmed.contains(&hash) {
            return false;
        }
        self.bloom.insert(canonical);
        self.confirmed.insert(hash)
    }

    pub fn contains(&self, canonical: &str) -> bool {
        // Bloom miss is authoritative; a hit needs exact confirmation.
        self.bloom.contains(canonical) && self.confirmed.contains(&fast_hash(canonical))
    }

    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }
}
