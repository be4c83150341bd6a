//! Crawl statistics
//!
//! Lock-free counters shared across workers; `snapshot` produces a
//! serializable view for progress events and the final summary.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct CrawlStats {
    started_at: Instant,
    pub crawled: AtomicUsize,
    pub failed: AtomicUsize,
    pub retries: AtomicUsize,
    pub duplicates_exact: AtomicUsize,
    pub pattern_capped: AtomicUsize,
    pub out_of_scope: AtomicUsize,
    pub invalid_urls: AtomicUsize,
    pub near_duplicates: AtomicUsize,
    pub enqueued: AtomicUsize,
    pub apis_found: AtomicUsize,
    pub forms_found: AtomicUsize,
    pub assets_found: AtomicUsize,
    pub subdomains_found: AtomicUsize,
    pub external_links: AtomicUsize,
    pub bytes_fetched: AtomicU64,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            crawled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            retries: AtomicUsize::new(0),
            duplicates_exact: AtomicUsize::new(0),
            pattern_capped: AtomicUsize::new(0),
            out_of_scope: AtomicUsize::new(0),
            invalid_urls: AtomicUsize::new(0),
            near_duplicates: AtomicUsize::new(0),
            enqueued: AtomicUsize::new(0),
            apis_found: AtomicUsize::new(0),
            forms_found: AtomicUsize::new(0),
            assets_found: AtomicUsize::new(0),
            subdomains_found: AtomicUsize::new(0),
            external_links: AtomicUsize::new(0),
            bytes_fetched: AtomicU64::new(0),
        }
    }
}

/// Serializable point-in-time view of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub crawled: usize,
    pub failed: usize,
    pub retries: usize,
    pub duplicates_exact: usize,
    pub pattern_capped: usize,
    pub out_of_scope: usize,
    pub invalid_urls: usize,
    pub near_duplicates: usize,
    pub enqueued: usize,
    pub apis_found: usize,
    pub forms_found: usize,
    pub assets_found: usize,
    pub subdomains_found: usize,
    pub external_links: usize,
    pub bytes_fetched: u64,
    pub elapsed_secs: u64,
}

impl CrawlStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            crawled: self.crawled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            duplicates_exact: self.duplicates_exact.load(Ordering::Relaxed),
            pattern_capped: self.pattern_capped.load(Ordering::Relaxed),
            out_of_scope: self.out_of_scope.load(Ordering::Relaxed),
            invalid_urls: self.invalid_urls.load(Ordering::Relaxed),
            near_duplicates: self.near_duplicates.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            apis_found: self.apis_found.load(Ordering::Relaxed),
            forms_found: self.forms_found.load(Ordering::Relaxed),
            assets_found: self.assets_found.load(Ordering::Relaxed),
            subdomains_found: self.subdomains_found.load(Ordering::Relaxed),
            external_links: self.external_links.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs(),
        }
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicUsize, amount: usize) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = CrawlStats::default();
        CrawlStats::incr(&stats.crawled);
        CrawlStats::incr(&stats.crawled);
        CrawlStats::add(&stats.apis_found, 3);
        stats.bytes_fetched.fetch_add(4096, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.crawled, 2);
        assert_eq!(snapshot.apis_found, 3);
        assert_eq!(snapshot.bytes_fetched, 4096);
        assert_eq!(snapshot.failed, 0);
    }
}
