//! Three-layer deduplication stack
//!
//! Layer order for `register`: exact visited set, then structural
//! pattern cap. The DOM near-duplicate layer needs a body, so it runs
//! after fetch via [`DedupStack::check_content`]. A `register` call is
//! transactional: the visited set and pattern registry mutate together
//! or not at all, under one critical section, so concurrent
//! registration of the same URL admits exactly one winner.

mod embedding;
mod pattern;
mod visited;

pub use embedding::{DomEmbedder, EmbeddingStore};
pub use pattern::{structural_pattern, PatternEntry, PatternRegistry};
pub use visited::{BloomFilter, VisitedSet};

use crate::canonical::CanonicalUrl;
use crate::config::DedupConfig;
use crate::types::ResourceClass;
use parking_lot::Mutex;
use tracing::debug;

/// Outcome of registering a URL with the dedup stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// New URL, admitted; the caller should enqueue it.
    Enqueue,
    /// The exact canonical URL was already registered.
    DuplicateExact,
    /// The URL's structural pattern has reached its cap.
    PatternCapped(String),
    /// The page body matched a stored embedding.
    NearDuplicate { other_url: String, similarity: f32 },
}

struct RegisterState {
    visited: VisitedSet,
    patterns: PatternRegistry,
}

/// Shared dedup stack. Cheap to share behind an `Arc`.
pub struct DedupStack {
    state: Mutex<RegisterState>,
    embedder: DomEmbedder,
    embeddings: Mutex<EmbeddingStore>,
}

impl DedupStack {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            state: Mutex::new(RegisterState {
                visited: VisitedSet::new(config.expected_urls, config.bloom_false_positive_rate),
                patterns: PatternRegistry::new(config.pattern_samples),
            }),
            embedder: DomEmbedder::new(config.embedding_dim),
            embeddings: Mutex::new(EmbeddingStore::new(
                config.similarity_threshold,
                config.max_embeddings,
            )),
        }
    }

    /// Register a URL before enqueueing. At most one caller ever gets
    /// `Enqueue` for a given canonical URL.
    pub fn register(&self, url: &CanonicalUrl, class: ResourceClass) -> Decision {
        let pattern = structural_pattern(url);
        let cap = class.pattern_cap();
        let mut state = self.state.lock();

        if state.visited.contains(url.as_str()) {
            return Decision::DuplicateExact;
        }
        if !state.patterns.would_admit(&pattern, cap) {
            state.patterns.record_skip(&pattern);
            debug!(url = %url, pattern = %pattern, "pattern cap reached");
            return Decision::PatternCapped(pattern);
        }
        state.visited.insert(url.as_str());
        state.patterns.admit(&pattern, url.as_str());
        Decision::Enqueue
    }

    /// Mark a URL visited without pattern accounting, used when
    /// re-seeding from a checkpoint.
    pub fn mark_visited(&self, canonical: &str) {
        self.state.lock().visited.insert(canonical);
    }

    pub fn is_visited(&self, canonical: &str) -> bool {
        self.state.lock().visited.contains(canonical)
    }

    /// Layer 3c: compare a fetched HTML body against stored page
    /// embeddings. Returns the matched URL and similarity when the
    /// page is a near-duplicate.
    pub fn check_content(&self, url: &CanonicalUrl, html: &str) -> Option<(String, f32)> {
        let vector = self.embedder.embed(html);
        self.embeddings.lock().check_and_insert(url.as_str(), vector)
    }

    pub fn visited_count(&self) -> usize {
        self.state.lock().visited.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.state.lock().patterns.len()
    }

    pub fn total_pattern_skips(&self) -> usize {
        self.state.lock().patterns.total_skipped()
    }

    /// Snapshot of a single pattern's entry.
    pub fn pattern_entry(&self, pattern: &str) -> Option<PatternEntry> {
        self.state.lock().patterns.get(pattern).cloned()
    }

    /// Snapshot of all pattern entries.
    pub fn pattern_snapshot(&self) -> Vec<(String, PatternEntry)> {
        self.state
            .lock()
            .patterns
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use std::sync::Arc;

    fn stack() -> DedupStack {
        DedupStack::new(&DedupConfig::default())
    }

    #[test]
    fn test_exact_duplicate() {
        let stack = stack();
        let url = canonicalize("https://example.com/a").unwrap();
        assert_eq!(stack.register(&url, ResourceClass::Html), Decision::Enqueue);
        assert_eq!(
            stack.register(&url, ResourceClass::Html),
            Decision::DuplicateExact
        );
    }

    #[test]
    fn test_pattern_cap_html() {
        let stack = stack();
        let mut decisions = Vec::new();
        for i in 1..=5 {
            let url = canonicalize(&format!("https://example.com/p-{i}.html")).unwrap();
            decisions.push(stack.register(&url, ResourceClass::Html));
        }
        let enqueued = decisions
            .iter()
            .filter(|d| **d == Decision::Enqueue)
            .count();
        let capped = decisions
            .iter()
            .filter(|d| matches!(d, Decision::PatternCapped(p) if p == "/p-{num}.html"))
            .count();
        assert_eq!(enqueued, 3);
        assert_eq!(capped, 2);

        let entry = stack.pattern_entry("/p-{num}.html").unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.skipped, 2);
    }

    #[test]
    fn test_api_cap_is_five() {
        let stack = stack();
        let mut enqueued = 0;
        for i in 1..=8 {
            let url = canonicalize(&format!("https://example.com/api/items/{i}")).unwrap();
            if stack.register(&url, ResourceClass::Api) == Decision::Enqueue {
                enqueued += 1;
            }
        }
        assert_eq!(enqueued, 5);
    }

    #[test]
    fn test_capped_url_not_marked_visited() {
        let stack = stack();
        for i in 1..=3 {
            let url = canonicalize(&format!("https://example.com/img-{i}.x")).unwrap();
            stack.register(&url, ResourceClass::Static);
        }
        // The capped URLs never entered the visited set.
        assert!(!stack.is_visited("https://example.com/img-2.x"));
        assert!(stack.is_visited("https://example.com/img-1.x"));
    }

    #[test]
    fn test_concurrent_register_single_winner() {
        let stack = Arc::new(stack());
        let url = canonicalize("https://example.com/race").unwrap();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let stack = Arc::clone(&stack);
            let url = url.clone();
            handles.push(std::thread::spawn(move || {
                stack.register(&url, ResourceClass::Html)
            }));
        }
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| *d == Decision::Enqueue)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_near_duplicate_content() {
        let stack = stack();
        let page = |title: &str| {
            format!(
                "<html><head><title>{title}</title></head><body>\
                 <div id=\"m\"><h1>Catalog</h1>\
                 <ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>\
                 <p>one</p><p>two</p><p>three</p><p>four</p><p>five</p>\
                 <form action=\"/s\"><input name=\"q\"/></form></div></body></html>"
            )
        };
        let a = canonicalize("https://example.com/a").unwrap();
        let b = canonicalize("https://example.com/b").unwrap();
        assert!(stack.check_content(&a, &page("First")).is_none());
        let hit = stack.check_content(&b, &page("Second"));
        let (other, similarity) = hit.expect("should detect near-duplicate");
        assert_eq!(other, "https://example.com/a");
        assert!(similarity >= 0.85);
    }

    #[test]
    fn test_resume_marks_visited() {
        let stack = stack();
        stack.mark_visited("https://example.com/old");
        let url = canonicalize("https://example.com/old").unwrap();
        assert_eq!(
            stack.register(&url, ResourceClass::Html),
            Decision::DuplicateExact
        );
    }
}
