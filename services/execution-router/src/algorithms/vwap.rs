//! Volume-weighted average price execution
//!
//! Slices the parent order against a historical intraday volume profile
//! (24 hourly buckets) in 1-minute clips. If the run falls behind its
//! volume-weighted schedule by more than
//! [`VWAP_REDISTRIBUTION_DEVIATION_BPS`] for longer than
//! [`VWAP_REDISTRIBUTION_SECS`], the shortfall is redistributed across the
//! remaining buckets. Limit prices are shaded by
//! [`VWAP_IMPACT_REDUCTION_BPS`] to reduce market impact.

use super::{AlgorithmParams, AlgorithmState};
use crate::OrderRequest;
use chrono::{DateTime, Timelike, Utc};
use services_common::constants::routing::{
    VWAP_BUCKET_COUNT, VWAP_IMPACT_REDUCTION_BPS, VWAP_REDISTRIBUTION_DEVIATION_BPS,
    VWAP_REDISTRIBUTION_SECS, VWAP_SLICE_SECS,
};
use services_common::{Px, Qty, Side};

/// U-shaped default intraday volume curve (heavier at the open and close).
const DEFAULT_PROFILE: [f64; 24] = [
    6.0, 5.0, 4.2, 3.6, 3.2, 2.8, 2.5, 2.3, 2.2, 2.1, 2.0, 2.0, 2.0, 2.0, 2.1, 2.2, 2.3, 2.5, 2.8,
    3.2, 3.6, 4.2, 5.0, 6.0,
];

/// VWAP algorithm state.
#[derive(Debug)]
pub struct VwapAlgorithm {
    state: AlgorithmState,
    profile: [f64; VWAP_BUCKET_COUNT],
    last_slice_at: Option<DateTime<Utc>>,
    behind_schedule_since: Option<DateTime<Utc>>,
}

impl VwapAlgorithm {
    /// Build a VWAP run against the default intraday volume curve.
    #[must_use]
    pub fn new(parent_order: OrderRequest, params: AlgorithmParams) -> Self {
        Self::with_profile(parent_order, params, DEFAULT_PROFILE)
    }

    /// Build a VWAP run against a caller-supplied 24-bucket volume profile.
    #[must_use]
    pub fn with_profile(
        parent_order: OrderRequest,
        params: AlgorithmParams,
        profile: [f64; VWAP_BUCKET_COUNT],
    ) -> Self {
        Self {
            state: AlgorithmState::new(parent_order, params),
            profile,
            last_slice_at: None,
            behind_schedule_since: None,
        }
    }

    fn cumulative_weight_through(&self, now: DateTime<Utc>) -> f64 {
        let total: f64 = self.profile.iter().sum();
        if total <= 0.0 {
            return 1.0;
        }
        let hour = now.hour() as usize % VWAP_BUCKET_COUNT;
        let minute_frac = f64::from(now.minute()) / 60.0;
        let elapsed: f64 = self.profile[..hour].iter().sum::<f64>()
            + self.profile[hour] * minute_frac;
        (elapsed / total).clamp(0.0, 1.0)
    }

    fn expected_filled(&self, now: DateTime<Utc>) -> Qty {
        let total = self.state.parent_order.quantity.as_i64() as f64;
        Qty::from_i64((total * self.cumulative_weight_through(now)) as i64)
    }

    fn is_behind_schedule(&mut self, now: DateTime<Utc>) -> bool {
        let expected = self.expected_filled(now).as_i64() as f64;
        if expected <= 0.0 {
            return false;
        }
        let shortfall_bps = (expected - self.state.executed_qty.as_i64() as f64) / expected * 10_000.0;
        if shortfall_bps > VWAP_REDISTRIBUTION_DEVIATION_BPS {
            let since = *self.behind_schedule_since.get_or_insert(now);
            (now - since).num_seconds() >= VWAP_REDISTRIBUTION_SECS as i64
        } else {
            self.behind_schedule_since = None;
            false
        }
    }

    /// Produce the next 1-minute slice, sized to the volume profile (and
    /// boosted if the run is behind its volume-weighted schedule).
    pub fn next_slice(&mut self, now: DateTime<Utc>) -> Option<OrderRequest> {
        if self.state.completed || self.state.remaining_qty == Qty::ZERO {
            self.state.completed = true;
            return None;
        }
        if now < self.state.params.start_time || now > self.state.params.end_time {
            return None;
        }
        if let Some(last) = self.last_slice_at {
            if (now - last).num_seconds() < VWAP_SLICE_SECS as i64 {
                return None;
            }
        }

        let hour = now.hour() as usize % VWAP_BUCKET_COUNT;
        let total_weight: f64 = self.profile.iter().sum();
        let bucket_fraction = if total_weight > 0.0 {
            self.profile[hour] / total_weight
        } else {
            1.0 / VWAP_BUCKET_COUNT as f64
        };
        let minutes_in_hour = 60.0;
        let base_qty = Qty::from_i64(
            (self.state.parent_order.quantity.as_i64() as f64 * bucket_fraction / minutes_in_hour)
                as i64,
        );

        let boosted = if self.is_behind_schedule(now) {
            Qty::from_i64((base_qty.as_i64() as f64 * 1.5) as i64)
        } else {
            base_qty
        };

        let slice_qty = self.state.clamp_slice(boosted);
        if slice_qty == Qty::ZERO {
            return None;
        }

        self.last_slice_at = Some(now);
        let mut child = self.state.next_child_order(slice_qty, "vwap");
        child.limit_price = self.impact_shaded_price(child.limit_price, self.state.parent_order.side);
        Some(child)
    }

    /// Shade the limit price away from the touch by
    /// [`VWAP_IMPACT_REDUCTION_BPS`] to trade more passively.
    fn impact_shaded_price(&self, price: Option<Px>, side: Side) -> Option<Px> {
        let price = price.or(self.state.params.price_limit)?;
        let shade = (price.as_i64() as f64 * VWAP_IMPACT_REDUCTION_BPS / 10_000.0) as i64;
        Some(match side {
            Side::Bid => Px::from_i64(price.as_i64() - shade),
            Side::Ask => Px::from_i64(price.as_i64() + shade),
        })
    }

    /// Record a fill against the run.
    pub fn on_fill(&mut self, filled_qty: Qty) {
        self.state.executed_qty = self.state.executed_qty.add(filled_qty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutionAlgorithm, OrderType, TimeInForce};
    use chrono::Duration as ChronoDuration;
    use rustc_hash::FxHashMap;
    use services_common::Symbol;

    fn parent() -> OrderRequest {
        OrderRequest {
            client_order_id: "parent-1".into(),
            symbol: Symbol::new(1),
            side: Side::Bid,
            quantity: Qty::from_i64(100_000),
            order_type: OrderType::Limit,
            limit_price: Some(Px::from_i64(1_0000)),
            stop_price: None,
            time_in_force: TimeInForce::DAY,
            venue: None,
            strategy_id: "s".into(),
            algorithm_hint: Some(ExecutionAlgorithm::Vwap),
            priority: 5,
            constraints: None,
            metadata: crate::OrderMetadata::default(),
            params: FxHashMap::default(),
        }
    }

    fn params(now: DateTime<Utc>) -> AlgorithmParams {
        AlgorithmParams {
            start_time: now - ChronoDuration::hours(1),
            end_time: now + ChronoDuration::hours(23),
            max_participation_rate: 1000,
            min_order_size: Qty::from_i64(1),
            max_order_size: Qty::from_i64(1_000_000),
            price_limit: Some(Px::from_i64(1_0000)),
            urgency: 5,
            num_slices: None,
        }
    }

    #[test]
    fn produces_a_bounded_slice_within_window() {
        let now = Utc::now();
        let mut algo = VwapAlgorithm::new(parent(), params(now));
        let slice = algo.next_slice(now).expect("slice expected inside window");
        assert!(slice.quantity.as_i64() > 0);
        assert!(slice.quantity.as_i64() <= 1_000_000);
    }

    #[test]
    fn shades_limit_price_away_from_touch_on_bid() {
        let now = Utc::now();
        let mut algo = VwapAlgorithm::new(parent(), params(now));
        let slice = algo.next_slice(now).unwrap();
        let shaded = slice.limit_price.unwrap().as_i64();
        assert!(shaded < 1_0000);
    }
}
