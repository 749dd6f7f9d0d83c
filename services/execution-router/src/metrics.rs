//! Per-venue execution-quality tracking
//!
//! Tracks fill rate, uptime, failure rate, latency and cost efficiency per
//! venue with an exponential moving average, and derives the composite
//! reliability score the smart order router uses as a scoring factor.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use services_common::constants::routing::{
    RELIABILITY_COST_WEIGHT, RELIABILITY_FAILURE_WEIGHT, RELIABILITY_FILL_RATE_WEIGHT,
    RELIABILITY_LATENCY_CAP_MS, RELIABILITY_LATENCY_WEIGHT, RELIABILITY_UPTIME_WEIGHT,
};
use std::sync::Arc;

/// Rolling execution-quality metrics for a single venue.
#[derive(Debug, Clone, Copy)]
pub struct VenueMetrics {
    /// EWMA fill rate in `[0, 1]`.
    pub fill_rate: f64,
    /// EWMA uptime fraction in `[0, 1]`.
    pub uptime: f64,
    /// EWMA failure rate in `[0, 1]`.
    pub failure_rate: f64,
    /// EWMA round-trip latency in milliseconds.
    pub latency_ms: f64,
    /// EWMA cost efficiency in `[0, 1]` (1 = cheapest observed).
    pub cost_efficiency: f64,
    /// Number of observations folded into this metric so far.
    pub sample_count: u64,
}

impl Default for VenueMetrics {
    fn default() -> Self {
        Self {
            fill_rate: 1.0,
            uptime: 1.0,
            failure_rate: 0.0,
            latency_ms: 0.0,
            cost_efficiency: 1.0,
            sample_count: 0,
        }
    }
}

impl VenueMetrics {
    /// `reliability_score = 0.3*fill_rate + 0.25*uptime + 0.2*(1-failure_rate)
    ///                     + 0.15*(1-latency/100) + 0.1*cost_efficiency`
    #[must_use]
    pub fn reliability_score(&self) -> f64 {
        let latency_component = (1.0 - self.latency_ms / RELIABILITY_LATENCY_CAP_MS).clamp(0.0, 1.0);
        RELIABILITY_FILL_RATE_WEIGHT * self.fill_rate
            + RELIABILITY_UPTIME_WEIGHT * self.uptime
            + RELIABILITY_FAILURE_WEIGHT * (1.0 - self.failure_rate)
            + RELIABILITY_LATENCY_WEIGHT * latency_component
            + RELIABILITY_COST_WEIGHT * self.cost_efficiency
    }

    fn ewma(previous: f64, observation: f64, alpha: f64) -> f64 {
        alpha.mul_add(observation, (1.0 - alpha) * previous)
    }
}

/// A single execution outcome reported back to the tracker for a venue.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionOutcome {
    /// 1.0 if the child order filled, 0.0 if it was rejected/cancelled unfilled.
    pub filled: f64,
    /// 1.0 if the venue was reachable for this attempt, 0.0 otherwise.
    pub reachable: f64,
    /// 1.0 if the attempt failed (timeout, reject, error), 0.0 otherwise.
    pub failed: f64,
    /// Observed round-trip latency in milliseconds.
    pub latency_ms: f64,
    /// Observed cost efficiency in `[0, 1]` for this fill.
    pub cost_efficiency: f64,
}

/// Thread-safe per-venue metrics store.
#[derive(Debug, Clone, Default)]
pub struct MetricsTracker {
    alpha: f64,
    inner: Arc<RwLock<FxHashMap<String, VenueMetrics>>>,
}

impl MetricsTracker {
    /// Create a tracker with the given EWMA smoothing factor.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            inner: Arc::new(RwLock::new(FxHashMap::default())),
        }
    }

    /// Fold a new observation into a venue's rolling metrics.
    pub fn record(&self, venue_id: &str, outcome: ExecutionOutcome) {
        let mut guard = self.inner.write();
        let entry = guard.entry(venue_id.to_string()).or_default();
        entry.fill_rate = VenueMetrics::ewma(entry.fill_rate, outcome.filled, self.alpha);
        entry.uptime = VenueMetrics::ewma(entry.uptime, outcome.reachable, self.alpha);
        entry.failure_rate = VenueMetrics::ewma(entry.failure_rate, outcome.failed, self.alpha);
        entry.latency_ms = VenueMetrics::ewma(entry.latency_ms, outcome.latency_ms, self.alpha);
        entry.cost_efficiency =
            VenueMetrics::ewma(entry.cost_efficiency, outcome.cost_efficiency, self.alpha);
        entry.sample_count += 1;
    }

    /// Current metrics for a venue, or the optimistic default if unseen.
    #[must_use]
    pub fn get(&self, venue_id: &str) -> VenueMetrics {
        self.inner
            .read()
            .get(venue_id)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_converges_toward_repeated_observation() {
        let tracker = MetricsTracker::new(0.1);
        for _ in 0..50 {
            tracker.record(
                "venue-a",
                ExecutionOutcome {
                    filled: 0.5,
                    reachable: 1.0,
                    failed: 0.0,
                    latency_ms: 20.0,
                    cost_efficiency: 0.9,
                },
            );
        }
        let m = tracker.get("venue-a");
        assert!((m.fill_rate - 0.5).abs() < 0.01);
    }

    #[test]
    fn unseen_venue_gets_optimistic_defaults() {
        let tracker = MetricsTracker::new(0.1);
        let m = tracker.get("unknown");
        assert_eq!(m.sample_count, 0);
        assert!((m.fill_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reliability_score_penalizes_high_latency() {
        let mut fast = VenueMetrics::default();
        fast.latency_ms = 5.0;
        let mut slow = VenueMetrics::default();
        slow.latency_ms = 150.0;
        assert!(fast.reliability_score() > slow.reliability_score());
    }
}
