//! Iceberg execution
//!
//! Shows only a small visible clip of the order at a time, refreshing it on
//! fill. Clip size varies by a configurable fraction to avoid a uniform
//! footprint, and prices are jittered by a few ticks. Tracks a
//! detection-risk score from four signals (clip-size uniformity, timing
//! regularity, price proximity to the touch, fill speed); when the score
//! clears [`ICEBERG_DETECTION_ALERT_THRESHOLD`] the clip variance is scaled
//! up by [`ICEBERG_VARIANCE_ADAPTATION_FACTOR`] to look less mechanical.

use super::{AlgorithmParams, AlgorithmState};
use crate::OrderRequest;
use rand::Rng;
use services_common::constants::routing::{
    ICEBERG_DETECTION_ALERT_THRESHOLD, ICEBERG_DETECTION_WEIGHT_CLIP_UNIFORMITY,
    ICEBERG_DETECTION_WEIGHT_FILL_SPEED, ICEBERG_DETECTION_WEIGHT_PRICE_PROXIMITY,
    ICEBERG_DETECTION_WEIGHT_TIMING_REGULARITY, ICEBERG_PRICE_JITTER_TICKS,
    ICEBERG_VARIANCE_ADAPTATION_FACTOR,
};
use services_common::{Px, Qty};
use std::time::{Duration, Instant};

/// A single observed clip, used to retrospectively score detectability.
#[derive(Debug, Clone, Copy)]
struct ClipObservation {
    qty: Qty,
    sent_at: Instant,
    fill_latency_ms: Option<f64>,
    distance_from_touch_ticks: i64,
}

/// Iceberg algorithm state.
#[derive(Debug)]
pub struct IcebergAlgorithm {
    state: AlgorithmState,
    base_display_qty: Qty,
    refresh_qty: Qty,
    /// Fraction by which clip size is randomly varied, `0.1` = ±10%.
    clip_variance: f64,
    observations: Vec<ClipObservation>,
}

impl IcebergAlgorithm {
    /// Build an iceberg run with a base visible clip size and starting
    /// clip-size variance.
    #[must_use]
    pub fn new(parent_order: OrderRequest, params: AlgorithmParams, display_qty: Qty) -> Self {
        Self {
            state: AlgorithmState::new(parent_order, params),
            base_display_qty: display_qty,
            refresh_qty: display_qty,
            clip_variance: 0.1,
            observations: Vec::new(),
        }
    }

    /// Produce the next visible clip, jittered in size and price.
    pub fn next_slice(&mut self, current_touch: Option<Px>) -> Option<OrderRequest> {
        if self.state.completed || self.state.remaining_qty == Qty::ZERO {
            self.state.completed = true;
            return None;
        }

        let varied = self.varied_clip_size();
        let slice_qty = self.state.clamp_slice(varied);
        if slice_qty == Qty::ZERO {
            return None;
        }

        let mut child = self.state.next_child_order(slice_qty, "iceberg");
        let jitter_ticks = rand::thread_rng()
            .gen_range(-ICEBERG_PRICE_JITTER_TICKS..=ICEBERG_PRICE_JITTER_TICKS);
        let base_price = child.limit_price.or(self.state.params.price_limit).or(current_touch);
        child.limit_price = base_price.map(|p| Px::from_i64(p.as_i64() + jitter_ticks));

        let distance = match (child.limit_price, current_touch) {
            (Some(p), Some(t)) => (p.as_i64() - t.as_i64()).abs(),
            _ => 0,
        };
        self.observations.push(ClipObservation {
            qty: slice_qty,
            sent_at: Instant::now(),
            fill_latency_ms: None,
            distance_from_touch_ticks: distance,
        });

        Some(child)
    }

    fn varied_clip_size(&self) -> Qty {
        let base = self.refresh_qty.as_i64() as f64;
        let delta = base * self.clip_variance;
        let jittered = rand::thread_rng().gen_range((base - delta)..=(base + delta));
        Qty::from_i64(jittered.max(0.0) as i64)
    }

    /// Record a fill against the most recent clip and refresh the display
    /// quantity once it is fully consumed.
    pub fn on_fill(&mut self, filled_qty: Qty) {
        self.state.executed_qty = self.state.executed_qty.add(filled_qty);
        self.refresh_qty = Qty::from_i64((self.refresh_qty.as_i64() - filled_qty.as_i64()).max(0));
        if let Some(last) = self.observations.last_mut() {
            last.fill_latency_ms = Some(last.sent_at.elapsed().as_secs_f64() * 1000.0);
        }
        if self.refresh_qty == Qty::ZERO {
            self.refresh_qty = self.base_display_qty;
        }

        if self.detection_risk_score() > ICEBERG_DETECTION_ALERT_THRESHOLD {
            self.clip_variance *= ICEBERG_VARIANCE_ADAPTATION_FACTOR;
        }
    }

    /// Composite detectability score in `[0, 1]` over the last clips: high
    /// when clip sizes are uniform, timing is regular, prices hug the
    /// touch, and fills come back unusually fast.
    #[must_use]
    pub fn detection_risk_score(&self) -> f64 {
        if self.observations.len() < 2 {
            return 0.0;
        }
        let qtys: Vec<f64> = self.observations.iter().map(|o| o.qty.as_i64() as f64).collect();
        let clip_uniformity = 1.0 - coefficient_of_variation(&qtys).min(1.0);

        let gaps: Vec<f64> = self
            .observations
            .windows(2)
            .map(|w| w[1].sent_at.duration_since(w[0].sent_at).as_secs_f64())
            .collect();
        let timing_regularity = if gaps.is_empty() {
            0.0
        } else {
            1.0 - coefficient_of_variation(&gaps).min(1.0)
        };

        let avg_distance = self
            .observations
            .iter()
            .map(|o| o.distance_from_touch_ticks as f64)
            .sum::<f64>()
            / self.observations.len() as f64;
        let price_proximity = (1.0 - avg_distance / f64::from(ICEBERG_PRICE_JITTER_TICKS as i32).max(1.0))
            .clamp(0.0, 1.0);

        let fill_speeds: Vec<f64> = self
            .observations
            .iter()
            .filter_map(|o| o.fill_latency_ms)
            .collect();
        let fill_speed = if fill_speeds.is_empty() {
            0.0
        } else {
            let avg_ms = fill_speeds.iter().sum::<f64>() / fill_speeds.len() as f64;
            (1.0 - avg_ms / 1000.0).clamp(0.0, 1.0)
        };

        ICEBERG_DETECTION_WEIGHT_CLIP_UNIFORMITY * clip_uniformity
            + ICEBERG_DETECTION_WEIGHT_TIMING_REGULARITY * timing_regularity
            + ICEBERG_DETECTION_WEIGHT_PRICE_PROXIMITY * price_proximity
            + ICEBERG_DETECTION_WEIGHT_FILL_SPEED * fill_speed
    }
}

fn coefficient_of_variation(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutionAlgorithm, OrderType, TimeInForce};
    use chrono::{Duration as ChronoDuration, Utc};
    use rustc_hash::FxHashMap;
    use services_common::{Side, Symbol};

    fn parent() -> OrderRequest {
        OrderRequest {
            client_order_id: "parent-1".into(),
            symbol: Symbol::new(1),
            side: Side::Bid,
            quantity: Qty::from_i64(10_000),
            order_type: OrderType::Iceberg,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::DAY,
            venue: None,
            strategy_id: "s".into(),
            algorithm_hint: Some(ExecutionAlgorithm::Iceberg),
            priority: 5,
            constraints: None,
            metadata: crate::OrderMetadata::default(),
            params: FxHashMap::default(),
        }
    }

    fn params() -> AlgorithmParams {
        let now = Utc::now();
        AlgorithmParams {
            start_time: now,
            end_time: now + ChronoDuration::hours(1),
            max_participation_rate: 1000,
            min_order_size: Qty::from_i64(1),
            max_order_size: Qty::from_i64(10_000),
            price_limit: Some(Px::from_i64(1_0000)),
            urgency: 5,
            num_slices: None,
        }
    }

    #[test]
    fn clip_size_stays_near_base_display() {
        let mut algo = IcebergAlgorithm::new(parent(), params(), Qty::from_i64(500));
        let slice = algo.next_slice(Some(Px::from_i64(1_0000))).unwrap();
        assert!(slice.quantity.as_i64() > 0);
        assert!((slice.quantity.as_i64() - 500).abs() <= 100);
    }

    #[test]
    fn refresh_resets_after_full_clip_fill() {
        let mut algo = IcebergAlgorithm::new(parent(), params(), Qty::from_i64(500));
        let slice = algo.next_slice(Some(Px::from_i64(1_0000))).unwrap();
        algo.on_fill(slice.quantity);
        assert_eq!(algo.refresh_qty.as_i64(), 500);
    }

    #[test]
    fn detection_score_is_zero_with_no_history() {
        let algo = IcebergAlgorithm::new(parent(), params(), Qty::from_i64(500));
        assert!((algo.detection_risk_score() - 0.0).abs() < f64::EPSILON);
    }
}
