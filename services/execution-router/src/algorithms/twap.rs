//! Time-weighted average price execution
//!
//! Splits the parent order into even slices across the window, retrying a
//! failed slice up to [`TWAP_MAX_RETRIES`] times with a fixed backoff before
//! giving up on that slice and moving on. Considered complete once filled
//! quantity clears [`TWAP_COMPLETION_THRESHOLD`] of the parent size.

use super::{AlgorithmParams, AlgorithmState};
use crate::OrderRequest;
use chrono::Utc;
use services_common::constants::routing::{
    TWAP_COMPLETION_THRESHOLD, TWAP_MAX_RETRIES, TWAP_RETRY_BACKOFF_SECS,
};
use services_common::Qty;
use std::time::{Duration, Instant};

/// TWAP algorithm state.
#[derive(Debug)]
pub struct TwapAlgorithm {
    state: AlgorithmState,
    total_slices: u32,
    slices_sent: u32,
    retry_count: u32,
    next_retry_at: Option<Instant>,
}

impl TwapAlgorithm {
    /// Build a TWAP run. Uses `params.num_slices` when the caller specified
    /// one; otherwise divides the window into one slice per minute (minimum
    /// one slice). The i-th slice targets `start + i * (duration / n)`.
    #[must_use]
    pub fn new(parent_order: OrderRequest, params: AlgorithmParams) -> Self {
        let total_slices = params.num_slices.unwrap_or_else(|| {
            let duration = params.end_time - params.start_time;
            u32::try_from((duration.num_seconds() / 60).max(1)).unwrap_or(u32::MAX)
        }).max(1);
        Self {
            state: AlgorithmState::new(parent_order, params),
            total_slices,
            slices_sent: 0,
            retry_count: 0,
            next_retry_at: None,
        }
    }

    /// Fraction of the parent filled so far.
    #[must_use]
    pub fn completion_fraction(&self) -> f64 {
        self.state.completion_fraction()
    }

    /// Whether the run has cleared the completion threshold or exhausted
    /// its slice budget.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.completed || self.completion_fraction() >= TWAP_COMPLETION_THRESHOLD
    }

    /// `start + i * (duration / n)`, the earliest time the i-th slice
    /// (0-indexed) may go out.
    fn target_time(&self, slice_index: u32) -> chrono::DateTime<Utc> {
        let duration = self.state.params.end_time - self.state.params.start_time;
        let per_slice = duration / i32::try_from(self.total_slices.max(1)).unwrap_or(i32::MAX);
        self.state.params.start_time + per_slice * i32::try_from(slice_index).unwrap_or(i32::MAX)
    }

    /// Produce the next child slice, or `None` if it isn't time yet / the
    /// run is complete.
    pub fn next_slice(&mut self) -> Option<OrderRequest> {
        if self.is_done() || self.slices_sent >= self.total_slices {
            self.state.completed = true;
            return None;
        }
        if let Some(retry_at) = self.next_retry_at {
            if Instant::now() < retry_at {
                return None;
            }
        }
        if Utc::now() < self.target_time(0) {
            return None;
        }

        let remaining_slices = self.total_slices - self.slices_sent;
        let even_qty = Qty::from_i64(self.state.remaining_qty.as_i64() / i64::from(remaining_slices.max(1)));
        let slice_qty = self.state.clamp_slice(even_qty);

        if slice_qty == Qty::ZERO {
            self.state.completed = true;
            return None;
        }

        self.slices_sent += 1;
        self.next_retry_at = None;
        Some(self.state.next_child_order(slice_qty, "twap"))
    }

    /// Report that the most recently issued slice was rejected or timed
    /// out at the venue; schedules a retry with fixed backoff, or abandons
    /// the slice after [`TWAP_MAX_RETRIES`] attempts.
    pub fn on_slice_failed(&mut self) {
        self.retry_count += 1;
        if self.retry_count > TWAP_MAX_RETRIES {
            self.retry_count = 0;
            return;
        }
        self.next_retry_at = Some(Instant::now() + Duration::from_secs(TWAP_RETRY_BACKOFF_SECS));
        self.slices_sent = self.slices_sent.saturating_sub(1);
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
            algorithm_hint: Some(ExecutionAlgorithm::Twap),
            priority: 5,
            constraints: None,
            metadata: crate::OrderMetadata::default(),
            params: FxHashMap::default(),
        }
    }

    fn params() -> AlgorithmParams {
        let now = Utc::now() - ChronoDuration::seconds(1);
        AlgorithmParams {
            start_time: now,
            end_time: now + ChronoDuration::minutes(5),
            max_participation_rate: 1000,
            min_order_size: Qty::from_i64(1),
            max_order_size: Qty::from_i64(100_000),
            price_limit: Some(Px::from_i64(1_0000)),
            urgency: 5,
            num_slices: None,
        }
    }

    #[test]
    fn slices_evenly_and_completes() {
        let mut algo = TwapAlgorithm::new(parent(), params());
        let mut total = Qty::ZERO;
        while let Some(child) = algo.next_slice() {
            total = total.add(child.quantity);
            algo.on_fill(child.quantity);
        }
        assert!(algo.is_done());
        assert_eq!(total.as_i64(), 10_000);
    }

    #[test]
    fn explicit_num_slices_overrides_per_minute_default() {
        let now = Utc::now() - ChronoDuration::seconds(1);
        let mut p = params();
        p.start_time = now;
        p.end_time = now + ChronoDuration::seconds(10);
        p.num_slices = Some(5);
        let mut algo = TwapAlgorithm::new(parent(), p);
        let mut count = 0;
        while let Some(child) = algo.next_slice() {
            algo.on_fill(child.quantity);
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn retry_requeues_failed_slice() {
        let mut algo = TwapAlgorithm::new(parent(), params());
        let first = algo.next_slice().unwrap();
        algo.on_slice_failed();
        assert!(algo.next_slice().is_none());
        algo.next_retry_at = None;
        let retried = algo.next_slice().unwrap();
        assert_eq!(first.quantity, retried.quantity);
    }
}
