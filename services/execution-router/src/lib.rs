//! Execution Router
//!
//! Multi-venue smart order routing and execution:
//! - Smart order routing across registered venues (`smart_router`)
//! - Execution algorithms: TWAP, VWAP, POV, Iceberg (`algorithms`)
//! - Per-venue adapters and liquidity feeds behind trait seams (`capability`)
//! - Parent-order lifecycle orchestration (`orchestrator`)
//! - A safety gate and MEV-aware route execution (`safety`, `route_executor`)
//! - Telemetry fan-out over the shared event bus (`telemetry`)

pub mod algorithms;
pub mod capability;
pub mod config;
pub mod error;
pub mod liquidity;
pub mod metrics;
pub mod orchestrator;
pub mod route_executor;
pub mod safety;
pub mod smart_router;
pub mod telemetry;
pub mod venue_registry;

pub use error::{ExecutionError, ExecutionResult};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use services_common::{Px, Qty, Side, Symbol, Ts};

/// Order ID wrapper for unique identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Market order - execute immediately at best price
    Market,
    /// Limit order - execute at specified price or better
    Limit,
    /// Stop order - trigger when price reaches stop level
    Stop,
    /// Stop limit order
    StopLimit,
    /// Iceberg order - show only part of total quantity
    Iceberg,
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled
    GTC,
    /// Immediate or cancel
    IOC,
    /// Fill or kill
    FOK,
    /// Good till date
    GTD,
    /// Day order
    DAY,
}

/// Order modification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderModification {
    /// New price (optional)
    pub price: Option<Px>,
    /// New quantity (optional)
    pub quantity: Option<Qty>,
    /// New time in force (optional)
    pub time_in_force: Option<TimeInForce>,
}

/// Order lifecycle state.
///
/// `Received -> Validated -> Routed -> Executing -> {Completed, Partial,
/// Failed, Cancelled, Expired}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted by the orchestrator, not yet validated.
    Received,
    /// Passed the safety gate and parameter validation.
    Validated,
    /// A routing decision has been produced.
    Routed,
    /// Slices are actively being worked.
    Executing,
    /// Fully filled.
    Completed,
    /// Terminated with some quantity filled and the remainder abandoned.
    Partial,
    /// Terminated with a venue or internal error and no recovery path.
    Failed,
    /// Cancelled on request.
    Cancelled,
    /// Time-in-force window elapsed before completion.
    Expired,
}

impl OrderStatus {
    /// Terminal states no longer accept mutation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Partial | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

/// Execution algorithm selected for a parent order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionAlgorithm {
    /// Route directly through the smart order router with no time-slicing.
    Direct,
    /// Time-weighted average price.
    Twap,
    /// Volume-weighted average price.
    Vwap,
    /// Percentage of market volume.
    Pov,
    /// Iceberg (partial display with stealth clips).
    Iceberg,
}

/// Caller-declared urgency for an order; biases routing priority bonuses and
/// the venue eligibility latency cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    /// No priority bonus; latency is not a hard eligibility gate.
    Low,
    /// Default urgency.
    Medium,
    /// Receives a reliability-weighted priority bonus during routing.
    High,
    /// Receives the same priority bonus as `High`, and additionally skips
    /// venues whose average latency exceeds 100ms.
    Critical,
}

impl Default for Urgency {
    fn default() -> Self {
        Self::Medium
    }
}

impl Urgency {
    /// Maps to the 1-10 urgency scale the execution algorithms bias slice
    /// sizing and redistribution aggressiveness on.
    #[must_use]
    pub const fn as_algorithm_weight(self) -> u8 {
        match self {
            Self::Low => 2,
            Self::Medium => 5,
            Self::High => 7,
            Self::Critical => 10,
        }
    }
}

/// Caller-supplied limits the orchestrator and algorithms must respect while
/// working a parent order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderConstraints {
    /// Cancel the remaining quantity if realized slippage exceeds this many
    /// basis points.
    pub max_slippage_bps: Option<u32>,
    /// Expire the order if it has not completed within this many seconds of
    /// acceptance.
    pub max_execution_time_secs: Option<u64>,
    /// Upper bound on the number of slices an algorithm may emit (TWAP's `n`).
    pub max_slices: Option<u32>,
    /// Minimum acceptable `filled_qty / total_qty` for a `Partial` result to
    /// be considered acceptable rather than escalated.
    pub min_fill_rate: Option<f64>,
}

/// Caller-supplied metadata describing how an order should be treated by the
/// safety gate, MEV protection and venue selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderMetadata {
    /// Urgency bucket, consulted by routing priority and venue eligibility.
    pub urgency: Urgency,
    /// Marks the order as already simulated (e.g. resubmitted after a
    /// `ModeConverted` event); the orchestrator does not re-tag it.
    pub is_simulation: bool,
    /// Wrap this order's allocations with `ProtectionService` before submission.
    pub mev_protection: bool,
    /// Venues to prefer when the router has a choice among equally-scored candidates.
    pub preferred_venues: Vec<String>,
    /// Venues this order must never be routed to.
    pub blocked_venues: Vec<String>,
    /// Permits this order to proceed while the safety gate is `Paused`.
    pub allow_in_paused_mode: bool,
}

impl Default for OrderMetadata {
    fn default() -> Self {
        Self {
            urgency: Urgency::Medium,
            is_simulation: false,
            mev_protection: true,
            preferred_venues: Vec::new(),
            blocked_venues: Vec::new(),
            allow_in_paused_mode: false,
        }
    }
}

/// Incoming order request (the parent order before routing/slicing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client order ID
    pub client_order_id: String,
    /// Symbol
    pub symbol: Symbol,
    /// Buy or sell
    pub side: Side,
    /// Order quantity
    pub quantity: Qty,
    /// Order type
    pub order_type: OrderType,
    /// Limit price (for limit orders)
    pub limit_price: Option<Px>,
    /// Stop price (for stop orders)
    pub stop_price: Option<Px>,
    /// Time in force
    pub time_in_force: TimeInForce,
    /// Preferred venue (optional, overrides routing)
    pub venue: Option<String>,
    /// Strategy ID
    pub strategy_id: String,
    /// Execution algorithm hint from the caller; `None` defers to the
    /// predictive engine when its confidence clears the configured threshold.
    pub algorithm_hint: Option<ExecutionAlgorithm>,
    /// Scheduling priority; lower values are worked first. Slices from
    /// orders in the same `priority / 10` bucket race/aggregate together.
    pub priority: u32,
    /// Optional caller-declared limits (slippage, timing, slice count, fill rate).
    pub constraints: Option<OrderConstraints>,
    /// Urgency, simulation/MEV flags and venue preferences.
    pub metadata: OrderMetadata,
    /// Additional parameters
    pub params: FxHashMap<String, String>,
}

/// Order state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Internal order ID
    pub order_id: OrderId,
    /// Client order ID
    pub client_order_id: String,
    /// Exchange order ID
    pub exchange_order_id: Option<String>,
    /// Symbol
    pub symbol: Symbol,
    /// Side
    pub side: Side,
    /// Original quantity
    pub quantity: Qty,
    /// Filled quantity
    pub filled_quantity: Qty,
    /// Average fill price
    pub avg_fill_price: Px,
    /// Order status
    pub status: OrderStatus,
    /// Order type
    pub order_type: OrderType,
    /// Limit price
    pub limit_price: Option<Px>,
    /// Stop price
    pub stop_price: Option<Px>,
    /// Time in force
    pub time_in_force: TimeInForce,
    /// Venue routed to
    pub venue: String,
    /// Strategy ID
    pub strategy_id: String,
    /// Creation timestamp
    pub created_at: Ts,
    /// Last update timestamp
    pub updated_at: Ts,
    /// Fill events
    pub fills: Vec<Fill>,
}

/// Fill event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Fill ID from exchange
    pub fill_id: String,
    /// Fill quantity
    pub quantity: Qty,
    /// Fill price
    pub price: Px,
    /// Fill timestamp
    pub timestamp: Ts,
    /// Liquidity flag (maker/taker)
    pub is_maker: bool,
    /// Commission
    pub commission: i64,
    /// Commission asset
    pub commission_asset: String,
}

/// Execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Order ID
    pub order_id: OrderId,
    /// Client order ID
    pub client_order_id: String,
    /// Exchange order ID
    pub exchange_order_id: Option<String>,
    /// Report type
    pub report_type: ExecutionReportType,
    /// Order status
    pub status: OrderStatus,
    /// Filled quantity (cumulative)
    pub filled_qty: Qty,
    /// Last fill quantity
    pub last_qty: Option<Qty>,
    /// Last fill price
    pub last_price: Option<Px>,
    /// Average price
    pub avg_price: Option<Px>,
    /// Reject reason
    pub reject_reason: Option<String>,
    /// Report timestamp
    pub timestamp: Ts,
}

/// Execution report types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionReportType {
    /// New order acknowledged
    New,
    /// Order fill
    Fill,
    /// Order partially filled
    PartialFill,
    /// Order cancelled
    Cancelled,
    /// Order replaced/modified
    Replaced,
    /// Order rejected
    Rejected,
    /// Order expired
    Expired,
    /// Order status
    Status,
}

/// Rolling per-venue execution quality, as surfaced by `Executor::analytics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueAnalytics {
    /// Orders (allocations) sent to this venue.
    pub orders: u64,
    /// Cumulative filled quantity at this venue.
    pub volume: u64,
    /// Average slippage in basis points against the expected price, signed
    /// positive when execution was worse than expected.
    pub avg_slippage_bps: f64,
}

/// Rolling per-algorithm execution quality, as surfaced by
/// `Executor::analytics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlgorithmAnalytics {
    /// Parent orders worked by this algorithm.
    pub orders: u64,
    /// Parent orders that reached `Completed`.
    pub completed: u64,
    /// Cumulative filled quantity across all orders worked by this algorithm.
    pub volume: u64,
}

/// Aggregate execution-quality metrics across all orders, returned by
/// `Orchestrator::analytics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionAnalytics {
    /// Total orders accepted
    pub total_orders: u64,
    /// Orders that reached `Completed`
    pub filled_orders: u64,
    /// Orders that reached `Partial`
    pub partial_orders: u64,
    /// Cancelled orders
    pub cancelled_orders: u64,
    /// Rejected orders (failed validation or the safety gate)
    pub rejected_orders: u64,
    /// Orders that reached `Expired`
    pub expired_orders: u64,
    /// Orders that reached `Failed`
    pub failed_orders: u64,
    /// Total filled quantity across all orders
    pub total_volume: u64,
    /// Average realized slippage in basis points across all fills
    pub avg_slippage_bps: f64,
    /// `filled_orders / total_orders`, in `[0, 1]`
    pub fill_rate: f64,
    /// Per-venue rollups, keyed by venue id.
    pub venues: FxHashMap<String, VenueAnalytics>,
    /// Per-algorithm rollups.
    pub algorithms: FxHashMap<ExecutionAlgorithmKey, AlgorithmAnalytics>,
}

/// `ExecutionAlgorithm` as a hashable/serializable map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionAlgorithmKey {
    /// See `ExecutionAlgorithm::Direct`.
    Direct,
    /// See `ExecutionAlgorithm::Twap`.
    Twap,
    /// See `ExecutionAlgorithm::Vwap`.
    Vwap,
    /// See `ExecutionAlgorithm::Pov`.
    Pov,
    /// See `ExecutionAlgorithm::Iceberg`.
    Iceberg,
}

impl From<ExecutionAlgorithm> for ExecutionAlgorithmKey {
    fn from(algo: ExecutionAlgorithm) -> Self {
        match algo {
            ExecutionAlgorithm::Direct => Self::Direct,
            ExecutionAlgorithm::Twap => Self::Twap,
            ExecutionAlgorithm::Vwap => Self::Vwap,
            ExecutionAlgorithm::Pov => Self::Pov,
            ExecutionAlgorithm::Iceberg => Self::Iceberg,
        }
    }
}
