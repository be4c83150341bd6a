//! Link harvester
//!
//! Every extracted link runs the same gauntlet in a fixed order:
//! validator, canonicalizer, scope engine, dedup stack, frontier. A
//! rejection at any step stops the pipeline for that link; the reason
//! lands in the crawl statistics.

use crate::canonical::{canonicalize, SmartUrlValidator};
use crate::dedup::{Decision, DedupStack};
use crate::frontier::Frontier;
use crate::scope::{ScopeDecision, ScopeEngine};
use crate::stats::CrawlStats;
use crate::types::{DiscoverySource, ResourceClass};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Outcome of offering one raw link to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestOutcome {
    /// Enqueued with this priority score.
    Enqueued(f64),
    Invalid,
    OutOfScope(ScopeDecision),
    /// Out-of-scope host recorded as an external link.
    External,
    Duplicate(Decision),
    /// The global URL cap stopped the enqueue.
    CapReached,
}

/// Feeds raw links through canonicalize, scope, dedup and into the
/// frontier.
pub struct Harvester {
    validator: SmartUrlValidator,
    scope: Arc<ScopeEngine>,
    dedup: Arc<DedupStack>,
    frontier: Arc<Frontier>,
    stats: Arc<CrawlStats>,
    enqueued: AtomicUsize,
    max_urls: usize,
}

impl Harvester {
    pub fn new(
        validator: SmartUrlValidator,
        scope: Arc<ScopeEngine>,
        dedup: Arc<DedupStack>,
        frontier: Arc<Frontier>,
        stats: Arc<CrawlStats>,
        max_urls: usize,
    ) -> Self {
        Self {
            validator,
            scope,
            dedup,
            frontier,
            stats,
            enqueued: AtomicUsize::new(0),
            max_urls,
        }
    }

    /// Offer one raw link discovered at `parent_depth`; survivors are
    /// enqueued at `parent_depth + 1`.
    pub fn offer(
        &self,
        raw: &str,
        parent_depth: usize,
        discovered_by: DiscoverySource,
    ) -> HarvestOutcome {
        self.offer_at_depth(raw, parent_depth + 1, discovered_by)
    }

    /// Offer a link at an explicit depth, used for seeds (depth 0) and
    /// passive sources.
    pub fn offer_at_depth(
        &self,
        raw: &str,
        depth: usize,
        discovered_by: DiscoverySource,
    ) -> HarvestOutcome {
        if !self.validator.is_acceptable(raw) {
            CrawlStats::incr(&self.stats.invalid_urls);
            return HarvestOutcome::Invalid;
        }

        let url = match canonicalize(raw) {
            Ok(url) => url,
            Err(e) => {
                trace!(raw, error = %e, "dropping invalid URL");
                CrawlStats::incr(&self.stats.invalid_urls);
                return HarvestOutcome::Invalid;
            }
        };

        if self.validator.is_trap_path(url.path()) {
            CrawlStats::incr(&self.stats.invalid_urls);
            return HarvestOutcome::Invalid;
        }

        let decision = self.scope.check(&url, depth);
        if !decision.is_in_scope() {
            CrawlStats::incr(&self.stats.out_of_scope);
            if decision == ScopeDecision::OutOfScopeHost
                && url.host() != self.scope.target_host()
            {
                CrawlStats::incr(&self.stats.external_links);
                trace!(url = %url, "recorded external link");
                return HarvestOutcome::External;
            }
            return HarvestOutcome::OutOfScope(decision);
        }

        let class = ResourceClass::classify(&url);
        match self.dedup.register(&url, class) {
            Decision::Enqueue => {}
            other => {
                match &other {
                    Decision::DuplicateExact => {
                        CrawlStats::incr(&self.stats.duplicates_exact)
                    }
                    Decision::PatternCapped(_) => {
                        CrawlStats::incr(&self.stats.pattern_capped)
                    }
                    _ => {}
                }
                return HarvestOutcome::Duplicate(other);
            }
        }

        // The cap check runs after dedup on purpose: a capped crawl
        // still remembers the URL so a resume will not re-offer it.
        if self.enqueued.fetch_add(1, Ordering::Relaxed) >= self.max_urls {
            self.enqueued.fetch_sub(1, Ordering::Relaxed);
            return HarvestOutcome::CapReached;
        }

        let is_internal = self.scope.host_in_scope(url.host());
        let score = self
            .frontier
            .push(url, depth, is_internal, class, discovered_by);
        CrawlStats::incr(&self.stats.enqueued);
        HarvestOutcome::Enqueued(score)
    }

    pub fn enqueued_total(&self) -> usize {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Account for entries restored from a checkpoint so the global
    /// cap keeps counting across a resume.
    pub fn note_restored(&self, count: usize) {
        self.enqueued.fetch_add(count, Ordering::Relaxed);
    }
}
