//! Adaptive frontier weight learner
//!
//! Consumes the result stream and periodically retunes the frontier's
//! weight vector. Every adjustment is multiplicative, clamped, and
//! appended to an audit log so a crawl report can explain why the
//! scheduler drifted.

use crate::frontier::Frontier;
use crate::types::{PageResult, ValueTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Results per evaluation batch.
const BATCH_SIZE: usize = 50;
/// Minimum results before the first evaluation.
const MIN_RESULTS: usize = 20;

/// Running counters over every consumed result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerStats {
    pub total: usize,
    pub high_value: usize,
    pub mid_value: usize,
    pub low_value: usize,
    pub with_apis: usize,
    pub apis_found: usize,
    pub successes: usize,
    pub response_ms_sum: u64,
}

impl LearnerStats {
    pub fn high_value_rate(&self) -> f64 {
        self.rate(self.high_value)
    }

    pub fn low_value_rate(&self) -> f64 {
        self.rate(self.low_value)
    }

    /// Fraction of results that carried at least one API endpoint.
    pub fn api_rate(&self) -> f64 {
        self.rate(self.with_apis)
    }

    pub fn success_rate(&self) -> f64 {
        self.rate(self.successes)
    }

    pub fn avg_response_ms(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.response_ms_sum as f64 / self.total as f64
        }
    }

    fn rate(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64
        }
    }
}

/// One audit-log record of a weight change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightAdjustment {
    pub tick: usize,
    pub weight: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// The learner. Single-consumer: exactly one task feeds results in,
/// so evaluation is race-free at batch boundaries.
pub struct AdaptiveLearner {
    frontier: Arc<Frontier>,
    eta: f64,
    enabled: bool,
    stats: LearnerStats,
    ticks: usize,
    audit: Vec<WeightAdjustment>,
}

impl AdaptiveLearner {
    pub fn new(frontier: Arc<Frontier>, eta: f64, enabled: bool) -> Self {
        Self {
            frontier,
            eta,
            enabled,
            stats: LearnerStats::default(),
            ticks: 0,
            audit: Vec::new(),
        }
    }

    /// Consume one result. Evaluates the adjustment rules after each
    /// full batch.
    pub fn on_result(&mut self, result: &PageResult) {
        let score = result.value_score();
        self.stats.total += 1;
        match ValueTier::from_score(score) {
            ValueTier::High => self.stats.high_value += 1,
            ValueTier::Mid => self.stats.mid_value += 1,
            ValueTier::Low => self.stats.low_value += 1,
        }
        if !result.apis.is_empty() {
            self.stats.with_apis += 1;
        }
        self.stats.apis_found += result.apis.len();
        if result.status > 0 && result.status < 400 {
            self.stats.successes += 1;
        }
        self.stats.response_ms_sum += result.elapsed_ms;

        if self.enabled
            && self.stats.total >= MIN_RESULTS
            && self.stats.total % BATCH_SIZE == 0
        {
            self.evaluate();
        }
    }

    pub fn stats(&self) -> &LearnerStats {
        &self.stats
    }

    pub fn audit_log(&self) -> &[WeightAdjustment] {
        &self.audit
    }

    fn evaluate(&mut self) {
        self.ticks += 1;
        let current = self.frontier.weights_snapshot();
        let mut next = (*current).clone();
        let eta = self.eta;

        if self.stats.high_value_rate() < 0.20 {
            next.w_path_value *= 1.0 + eta;
            self.record(
                "w_path_value",
                current.w_path_value,
                next.w_path_value,
                format!("high_value_rate {:.2} < 0.20", self.stats.high_value_rate()),
            );
        }
        if self.stats.api_rate() > 0.30 {
            next.w_params *= 1.0 + eta;
            self.record(
                "w_params",
                current.w_params,
                next.w_params,
                format!("api_rate {:.2} > 0.30", self.stats.api_rate()),
            );
        }
        if self.stats.low_value_rate() > 0.50 {
            next.w_depth *= 1.0 - 0.5 * eta;
            self.record(
                "w_depth",
                current.w_depth,
                next.w_depth,
                format!("low_value_rate {:.2} > 0.50", self.stats.low_value_rate()),
            );
        }
        if self.stats.success_rate() < 0.70 {
            next.w_internal *= 1.0 + 0.8 * eta;
            self.record(
                "w_internal",
                current.w_internal,
                next.w_internal,
                format!("success_rate {:.2} < 0.70", self.stats.success_rate()),
            );
        }

        if next != *current {
            let next = next.clamped();
            info!(
                tick = self.ticks,
                w_depth = next.w_depth,
                w_internal = next.w_internal,
                w_params = next.w_params,
                w_path_value = next.w_path_value,
                "frontier weights retuned"
            );
            self.frontier.set_weights(next);
        } else {
            debug!(tick = self.ticks, "no adjustment rule fired");
        }
    }

    fn record(&mut self, weight: &str, old_value: f64, new_value: f64, reason: String) {
        self.audit.push(WeightAdjustment {
            tick: self.ticks,
            weight: weight.to_string(),
            old_value,
            new_value,
            reason,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::frontier::WeightVector;
    use crate::types::{ApiEndpoint, DiscoverySource, ResourceClass};

    fn result(status: u16, links: usize, apis: usize) -> PageResult {
        let mut r = PageResult::skeletal(
            canonicalize("https://example.com/x").unwrap(),
            "https://example.com/x".into(),
            status,
            vec![],
            Some("text/html".into()),
            ResourceClass::Html,
            1,
            DiscoverySource::Link,
            100,
            1000,
        );
        r.links = (0..links).map(|i| format!("https://example.com/{i}")).collect();
        r.apis = (0..apis)
            .map(|i| ApiEndpoint {
                url: format!("/api/{i}"),
                method: "GET".into(),
            })
            .collect();
        r
    }

    #[test]
    fn test_low_value_batch_retunes_weights() {
        let frontier = Arc::new(Frontier::default());
        let mut learner = AdaptiveLearner::new(Arc::clone(&frontier), 0.15, true);

        // 45 artifact-free 200s and 5 404s: no high-value pages,
        // plenty of low-value ones, success rate 0.9.
        for _ in 0..45 {
            learner.on_result(&result(200, 0, 0));
        }
        for _ in 0..5 {
            learner.on_result(&result(404, 0, 0));
        }

        let w = frontier.weights_snapshot();
        assert!((w.w_path_value - 4.60).abs() < 1e-9, "got {}", w.w_path_value);
        assert!((w.w_depth - 2.775).abs() < 1e-9, "got {}", w.w_depth);
        // Untouched weights keep their defaults.
        assert!((w.w_internal - 2.0).abs() < 1e-9);
        assert!((w.w_params - 1.5).abs() < 1e-9);

        let rules_fired: Vec<&str> = learner
            .audit_log()
            .iter()
            .map(|a| a.weight.as_str())
            .collect();
        assert_eq!(rules_fired, vec!["w_path_value", "w_depth"]);
    }

    #[test]
    fn test_no_tick_before_batch_boundary() {
        let frontier = Arc::new(Frontier::default());
        let mut learner = AdaptiveLearner::new(Arc::clone(&frontier), 0.15, true);
        for _ in 0..49 {
            learner.on_result(&result(200, 0, 0));
        }
        assert!(learner.audit_log().is_empty());
        assert_eq!(*frontier.weights_snapshot(), WeightVector::default());
    }

    #[test]
    fn test_api_heavy_batch_boosts_params() {
        let frontier = Arc::new(Frontier::default());
        let mut learner = AdaptiveLearner::new(Arc::clone(&frontier), 0.15, true);
        // 20 rich results with APIs, 30 plain high-ish pages.
        for _ in 0..20 {
            learner.on_result(&result(200, 12, 2));
        }
        for _ in 0..30 {
            learner.on_result(&result(200, 12, 0));
        }
        let w = frontier.weights_snapshot();
        assert!((w.w_params - 1.5 * 1.15).abs() < 1e-9);
        // All pages high value: rules 1 and 3 stay quiet.
        assert!((w.w_path_value - 4.0).abs() < 1e-9);
        assert!((w.w_depth - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_failure_heavy_batch_boosts_internal() {
        let frontier = Arc::new(Frontier::default());
        let mut learner = AdaptiveLearner::new(Arc::clone(&frontier), 0.15, true);
        for _ in 0..30 {
            learner.on_result(&result(500, 0, 0));
        }
        for _ in 0..20 {
            learner.on_result(&result(200, 12, 1));
        }
        let w = frontier.weights_snapshot();
        // success_rate 0.4 < 0.7.
        assert!((w.w_internal - 2.0 * 1.12).abs() < 1e-9);
    }

    #[test]
    fn test_weights_never_leave_band() {
        let frontier = Arc::new(Frontier::default());
        let mut learner = AdaptiveLearner::new(Arc::clone(&frontier), 0.15, true);
        // Many low-value batches decay w_depth toward the floor.
        for _ in 0..200 {
            for _ in 0..50 {
                learner.on_result(&result(200, 0, 0));
            }
        }
        let w = frontier.weights_snapshot();
        assert!(w.w_depth >= 0.1);
        assert!(w.w_path_value <= 100.0);
    }

    #[test]
    fn test_disabled_learner_never_adjusts() {
        let frontier = Arc::new(Frontier::default());
        let mut learner = AdaptiveLearner::new(Arc::clone(&frontier), 0.15, false);
        for _ in 0..100 {
            learner.on_result(&result(404, 0, 0));
        }
        assert_eq!(*frontier.weights_snapshot(), WeightVector::default());
        assert!(learner.audit_log().is_empty());
    }
}
