//! Priority frontier
//!
//! A max-heap of pending URLs ordered by priority score, with FIFO
//! tie-breaking via a monotonic discovery sequence. Scores are
//! computed once at push time from the current weight snapshot;
//! workers block on `pop` until an entry or shutdown arrives.

mod score;

pub use score::{params_bonus, path_value, WeightVector, WEIGHT_MAX, WEIGHT_MIN};

use crate::canonical::CanonicalUrl;
use crate::types::{DiscoverySource, ResourceClass};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A pending URL with its scheduling attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub url: CanonicalUrl,
    pub depth: usize,
    /// Monotonic discovery sequence, the FIFO tie-breaker.
    pub discovered_at: u64,
    pub is_internal: bool,
    pub has_params: bool,
    pub priority_score: f64,
    pub value_type: ResourceClass,
    pub discovered_by: DiscoverySource,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority_score == other.priority_score && self.discovered_at == other.discovered_at
    }
}

impl Eq for FrontierEntry {}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher score first; equal scores pop in discovery order.
        self.priority_score
            .total_cmp(&other.priority_score)
            .then_with(|| other.discovered_at.cmp(&self.discovered_at))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The shared frontier. Push is synchronous; pop is async and parks
/// on a notifier while the heap is empty.
pub struct Frontier {
    heap: Mutex<BinaryHeap<FrontierEntry>>,
    weights: RwLock<Arc<WeightVector>>,
    notify: Notify,
    sequence: AtomicU64,
    closed: AtomicBool,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new(WeightVector::default())
    }
}

impl Frontier {
    pub fn new(weights: WeightVector) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            weights: RwLock::new(Arc::new(weights)),
            notify: Notify::new(),
            sequence: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Score and enqueue a URL. Returns the assigned score.
    pub fn push(
        &self,
        url: CanonicalUrl,
        depth: usize,
        is_internal: bool,
        value_type: ResourceClass,
        discovered_by: DiscoverySource,
    ) -> f64 {
        let weights = self.weights_snapshot();
        let priority_score = weights.score(depth, is_internal, url.param_count(), url.path());
        let entry = FrontierEntry {
            has_params: url.has_params(),
            url,
            depth,
            discovered_at: self.sequence.fetch_add(1, AtomicOrdering::Relaxed),
            is_internal,
            priority_score,
            value_type,
            discovered_by,
        };
        self.heap.lock().push(entry);
        self.notify.notify_one();
        priority_score
    }

    /// Re-enqueue an entry restored from a checkpoint, rescoring it
    /// with current weights but keeping a fresh (early) sequence slot.
    pub fn push_restored(&self, mut entry: FrontierEntry) {
        let weights = self.weights_snapshot();
        entry.priority_score = weights.score(
            entry.depth,
            entry.is_internal,
            entry.url.param_count(),
            entry.url.path(),
        );
        entry.discovered_at = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().push(entry);
        self.notify.notify_one();
    }

    /// Remove and return the highest-priority entry, waiting while
    /// the heap is empty. Returns `None` once the frontier is closed
    /// and drained, or immediately after `close`.
    pub async fn pop(&self) -> Option<FrontierEntry> {
        loop {
            if let Some(entry) = self.try_pop() {
                return Some(entry);
            }
            if self.closed.load(AtomicOrdering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<FrontierEntry> {
        self.heap.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Unordered snapshot of pending entries, for checkpointing.
    pub fn snapshot(&self) -> Vec<FrontierEntry> {
        self.heap.lock().iter().cloned().collect()
    }

    /// Replace the weight vector. In-flight pushes observe either the
    /// old or the new snapshot, never a mix.
    pub fn set_weights(&self, weights: WeightVector) {
        *self.weights.write() = Arc::new(weights.clamped());
    }

    pub fn weights_snapshot(&self) -> Arc<WeightVector> {
        Arc::clone(&self.weights.read())
    }

    /// Close the frontier: pending entries still pop, waiting poppers
    /// holding an empty heap return `None`.
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }
}
