//! External collaborator seams
//!
//! Each trait here stands in for a concrete integration (a market-data feed,
//! a venue's order-entry API, an MEV-protection service, a risk desk's
//! kill-switch, a forecasting model). The router only ever talks to these
//! traits; concrete adapters live outside this crate.

use crate::error::ExecutionResult;
use crate::liquidity::LiquiditySnapshot;
use async_trait::async_trait;
use services_common::{Px, Qty, Symbol};

/// Provides a current view of available liquidity for a symbol.
#[async_trait]
pub trait LiquiditySource: Send + Sync {
    /// Venue this source reports for.
    fn venue_id(&self) -> &str;

    /// Fetch the current liquidity snapshot for `symbol`, or `None` if the
    /// venue currently has no quotable market.
    async fn snapshot(&self, symbol: Symbol) -> ExecutionResult<Option<LiquiditySnapshot>>;
}

/// Submits and manages orders at a single venue.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Venue this adapter submits to.
    fn venue_id(&self) -> &str;

    /// Submit a child order; returns the venue's order identifier.
    async fn submit(
        &self,
        symbol: Symbol,
        side: services_common::Side,
        qty: Qty,
        limit_price: Option<Px>,
    ) -> ExecutionResult<String>;

    /// Cancel a previously submitted order.
    async fn cancel(&self, venue_order_id: &str) -> ExecutionResult<()>;
}

/// Outcome of a protection check on an outbound child order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionVerdict {
    /// Order may proceed unmodified.
    Allow,
    /// Order may proceed but should be routed privately (e.g. dark pool / RFQ).
    RouteDark,
    /// Order must not be sent; an attack pattern was detected.
    Block,
}

/// MEV / front-running protection for outbound orders.
#[async_trait]
pub trait ProtectionService: Send + Sync {
    /// Evaluate whether a child order destined for `venue` is safe to send.
    async fn evaluate(
        &self,
        venue: &str,
        symbol: Symbol,
        qty: Qty,
        limit_price: Option<Px>,
    ) -> ExecutionResult<ProtectionVerdict>;
}

/// Trading mode enforced by the safety gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TradingMode {
    /// Orders are routed and executed normally.
    Live,
    /// Orders flow through the full pipeline but no venue adapter is called.
    Simulation,
    /// No new orders are accepted; in-flight orders are cancelled after the grace period.
    Paused,
}

/// Central kill-switch and mode authority.
#[async_trait]
pub trait SafetyController: Send + Sync {
    /// Current trading mode.
    async fn mode(&self) -> TradingMode;

    /// Request an immediate mode transition.
    async fn set_mode(&self, mode: TradingMode, reason: String);
}

/// Forecasts the best execution algorithm and its parameters for an order.
#[async_trait]
pub trait PredictiveEngine: Send + Sync {
    /// Suggest an algorithm for the given order, with a confidence in `[0, 1]`.
    async fn suggest_algorithm(
        &self,
        symbol: Symbol,
        side: services_common::Side,
        qty: Qty,
    ) -> ExecutionResult<(crate::ExecutionAlgorithm, f64)>;
}
