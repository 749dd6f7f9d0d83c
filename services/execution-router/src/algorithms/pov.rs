//! Percentage-of-volume execution
//!
//! Each tick, sizes the next slice as `max_participation_rate * observed
//! market volume since the last tick`, capped by the configured min/max
//! slice bounds and the quantity still remaining.

use super::{AlgorithmParams, AlgorithmState};
use crate::OrderRequest;
use services_common::Qty;

/// POV algorithm state.
#[derive(Debug)]
pub struct PovAlgorithm {
    state: AlgorithmState,
}

impl PovAlgorithm {
    /// Build a POV run.
    #[must_use]
    pub fn new(parent_order: OrderRequest, params: AlgorithmParams) -> Self {
        Self {
            state: AlgorithmState::new(parent_order, params),
        }
    }

    /// Size and produce the next slice given the market volume observed
    /// since the previous tick.
    pub fn next_slice(&mut self, interval_market_volume: Qty) -> Option<OrderRequest> {
        if self.state.completed || self.state.remaining_qty == Qty::ZERO {
            self.state.completed = true;
            return None;
        }

        let participation_qty = Qty::from_i64(
            interval_market_volume
                .as_i64()
                .saturating_mul(i64::from(self.state.params.max_participation_rate))
                / 10_000,
        );

        if participation_qty == Qty::ZERO {
            return None;
        }
        let slice_qty = self.state.clamp_slice(participation_qty);
        if slice_qty == Qty::ZERO {
            return None;
        }

        Some(self.state.next_child_order(slice_qty, "pov"))
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
    use chrono::{Duration as ChronoDuration, Utc};
    use rustc_hash::FxHashMap;
    use services_common::{Px, Side, Symbol};

    fn parent() -> OrderRequest {
        OrderRequest {
            client_order_id: "parent-1".into(),
            symbol: Symbol::new(1),
            side: Side::Bid,
            quantity: Qty::from_i64(10_000),
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::DAY,
            venue: None,
            strategy_id: "s".into(),
            algorithm_hint: Some(ExecutionAlgorithm::Pov),
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
            max_participation_rate: 1000, // 10%
            min_order_size: Qty::from_i64(1),
            max_order_size: Qty::from_i64(10_000),
            price_limit: Some(Px::from_i64(1_0000)),
            urgency: 5,
            num_slices: None,
        }
    }

    #[test]
    fn sizes_slice_proportional_to_observed_volume() {
        let mut algo = PovAlgorithm::new(parent(), params());
        let slice = algo.next_slice(Qty::from_i64(5_000)).unwrap();
        assert_eq!(slice.quantity.as_i64(), 500); // 10% of 5_000
    }

    #[test]
    fn zero_market_volume_yields_no_slice() {
        let mut algo = PovAlgorithm::new(parent(), params());
        assert!(algo.next_slice(Qty::ZERO).is_none());
    }
}
