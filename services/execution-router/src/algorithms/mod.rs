//! Execution algorithms: TWAP, VWAP, POV, Iceberg
//!
//! Each algorithm owns an [`AlgorithmState`] tracking the parent order and
//! how much of it has been worked, and exposes a `next_slice`-style method
//! the orchestrator polls at the algorithm's configured tick rate.

pub mod iceberg;
pub mod pov;
pub mod twap;
pub mod vwap;

pub use iceberg::IcebergAlgorithm;
pub use pov::PovAlgorithm;
pub use twap::TwapAlgorithm;
pub use vwap::VwapAlgorithm;

use crate::OrderRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use services_common::{Px, Qty};

/// Parameters shared by every execution algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmParams {
    /// Window start.
    pub start_time: DateTime<Utc>,
    /// Window end.
    pub end_time: DateTime<Utc>,
    /// Maximum participation rate (fixed-point: `SCALE_3` = 100%).
    pub max_participation_rate: i32,
    /// Floor on any single child slice.
    pub min_order_size: Qty,
    /// Ceiling on any single child slice.
    pub max_order_size: Qty,
    /// Optional limit price beyond which slices are not sent.
    pub price_limit: Option<Px>,
    /// Urgency, 1 (patient) to 10 (aggressive); algorithms use this to bias
    /// slice sizing and redistribution aggressiveness.
    pub urgency: u8,
    /// Explicit slice count for algorithms that slice evenly over a window
    /// (TWAP). `None` lets the algorithm derive a slice count from the
    /// window length.
    pub num_slices: Option<u32>,
}

/// Shared bookkeeping for an in-flight algorithmic parent order.
#[derive(Debug, Clone)]
pub struct AlgorithmState {
    /// The parent order being worked.
    pub parent_order: OrderRequest,
    /// Parameters governing this run.
    pub params: AlgorithmParams,
    /// Cumulative filled quantity.
    pub executed_qty: Qty,
    /// Quantity still to be sliced out.
    pub remaining_qty: Qty,
    /// Child slices sent so far.
    pub child_orders: Vec<OrderRequest>,
    /// Whether the first slice has gone out.
    pub started: bool,
    /// Whether the algorithm has stopped issuing new slices.
    pub completed: bool,
}

impl AlgorithmState {
    /// Start fresh bookkeeping for a parent order.
    #[must_use]
    pub fn new(parent_order: OrderRequest, params: AlgorithmParams) -> Self {
        Self {
            remaining_qty: parent_order.quantity,
            executed_qty: Qty::ZERO,
            parent_order,
            params,
            child_orders: Vec::new(),
            started: false,
            completed: false,
        }
    }

    /// Fraction of the parent order filled so far, in `[0, 1]`.
    #[must_use]
    pub fn completion_fraction(&self) -> f64 {
        let total = self.parent_order.quantity.as_i64();
        if total == 0 {
            return 1.0;
        }
        self.executed_qty.as_i64() as f64 / total as f64
    }

    fn next_child_order(&mut self, slice_qty: Qty, tag: &str) -> OrderRequest {
        let mut child = self.parent_order.clone();
        child.quantity = slice_qty;
        child.client_order_id = format!("{}_{}_{}", child.client_order_id, tag, self.child_orders.len());
        self.remaining_qty = Qty::from_i64(self.remaining_qty.as_i64() - slice_qty.as_i64());
        self.child_orders.push(child.clone());
        self.started = true;
        child
    }

    fn clamp_slice(&self, qty: Qty) -> Qty {
        qty.max(self.params.min_order_size)
            .min(self.params.max_order_size)
            .min(self.remaining_qty)
    }
}
