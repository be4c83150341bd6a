//! Retry backoff and adaptive timeouts

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Exponential backoff policy for retryable fetch failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry attempt `attempt` (1-based), with ±10%
    /// jitter, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let jitter = rand::thread_rng().gen_range(0.9..=1.1);
        let delayed = Duration::from_secs_f64(raw * jitter);
        delayed.min(self.max_delay)
    }

    pub fn attempts_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_retries
    }
}

/// Per-request timeout derived from observed response times:
/// `clamp(avg * 3 + 10s, base, max)`.
pub struct AdaptiveTimeout {
    base: Duration,
    max: Duration,
    total_ms: AtomicU64,
    count: AtomicU64,
}

impl AdaptiveTimeout {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            total_ms: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record one observed response time.
    pub fn record(&self, elapsed_ms: u64) {
        self.total_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Current per-request timeout.
    pub fn current(&self) -> Duration {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return self.base;
        }
        let avg_ms = self.total_ms.load(Ordering::Relaxed) as f64 / count as f64;
        let derived = Duration::from_millis((avg_ms * 3.0) as u64) + Duration::from_secs(10);
        derived.clamp(self.base, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        for _ in 0..20 {
            let d1 = policy.delay_for(1).as_secs_f64();
            let d2 = policy.delay_for(2).as_secs_f64();
            let d3 = policy.delay_for(3).as_secs_f64();
            assert!((0.9..=1.1).contains(&d1), "attempt 1 out of band: {d1}");
            assert!((1.8..=2.2).contains(&d2), "attempt 2 out of band: {d2}");
            assert!((3.6..=4.4).contains(&d3), "attempt 3 out of band: {d3}");
        }
    }

    #[test]
    fn test_backoff_capped() {
        let policy = RetryPolicy::default();
        // 2^19 seconds is far past the 60s cap.
        assert_eq!(policy.delay_for(20), Duration::from_secs(60));
    }

    #[test]
    fn test_attempts_exhausted() {
        let policy = RetryPolicy::default();
        assert!(!policy.attempts_exhausted(3));
        assert!(policy.attempts_exhausted(4));
    }

    #[test]
    fn test_adaptive_timeout_starts_at_base() {
        let timeout = AdaptiveTimeout::new(Duration::from_secs(10), Duration::from_secs(60));
        assert_eq!(timeout.current(), Duration::from_secs(10));
    }

    #[test]
    fn test_adaptive_timeout_tracks_slow_responses() {
        let timeout = AdaptiveTimeout::new(Duration::from_secs(10), Duration::from_secs(60));
        for _ in 0..10 {
            timeout.record(4000);
        }
        // avg 4s * 3 + 10s = 22s.
        assert_eq!(timeout.current(), Duration::from_secs(22));
    }

    #[test]
    fn test_adaptive_timeout_clamped_at_max() {
        let timeout = AdaptiveTimeout::new(Duration::from_secs(10), Duration::from_secs(60));
        timeout.record(120_000);
        assert_eq!(timeout.current(), Duration::from_secs(60));
    }

    #[test]
    fn test_adaptive_timeout_never_below_base() {
        let timeout = AdaptiveTimeout::new(Duration::from_secs(15), Duration::from_secs(60));
        timeout.record(10);
        assert_eq!(timeout.current(), Duration::from_secs(15));
    }
}
