//! Order lifecycle orchestration
//!
//! The orchestrator is the top-level entry point: it validates an incoming
//! [`OrderRequest`], gates it through the safety controller, picks an
//! execution algorithm, routes and sends child orders, and tracks the
//! parent order through to a terminal state.
//!
//! `Received -> Validated -> Routed -> Executing -> {Completed, Partial,
//! Failed, Cancelled, Expired}`

use crate::algorithms::{AlgorithmParams, IcebergAlgorithm, PovAlgorithm, TwapAlgorithm, VwapAlgorithm};
use crate::capability::{PredictiveEngine, SafetyController, TradingMode};
use crate::config::ExecutionConfig;
use crate::error::{ExecutionError, ExecutionResult};
use crate::liquidity::LiquidityView;
use crate::metrics::MetricsTracker;
use crate::route_executor::{RouteExecutor, RouteOutcome};
use crate::safety::SafetyGate;
use crate::smart_router::{Allocation, Objective, RoutingDecision, SmartOrderRouter};
use crate::telemetry::{ExecutionEvent, Telemetry};
use crate::venue_registry::VenueRegistry;
use crate::{
    ExecutionAlgorithm, ExecutionAnalytics, Fill, Order, OrderId, OrderRequest, OrderStatus, Urgency,
};
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use services_common::{Px, Qty, Side, Symbol, Ts};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Dispatch group budget: allocations in the same priority/10 bucket race
/// together, and the bucket as a whole is abandoned if it runs longer than
/// this (remaining quantity carries to the next bucket).
const GROUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-order context threaded through a single `work_order` run: whether the
/// order is being simulated (safety gate in `Simulation` mode) and the
/// cancellation flag `cancel_order`/the safety cascade can set to interrupt
/// it between slices.
struct ExecCtx<'a> {
    order_id: OrderId,
    algorithm: ExecutionAlgorithm,
    simulate: bool,
    cancel_flag: &'a Arc<AtomicBool>,
}

impl ExecCtx<'_> {
    fn cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Shared collaborators and live order state for the execution router.
pub struct Orchestrator {
    config: ExecutionConfig,
    orders: DashMap<OrderId, Order>,
    next_order_id: AtomicU64,
    registry: VenueRegistry,
    liquidity: RwLock<LiquidityView>,
    metrics: MetricsTracker,
    router: SmartOrderRouter,
    executor: RouteExecutor,
    safety: Arc<SafetyGate>,
    telemetry: Arc<Telemetry>,
    predictive: Option<Arc<dyn PredictiveEngine>>,
    cancel_flags: DashMap<OrderId, Arc<AtomicBool>>,
    analytics: Mutex<ExecutionAnalytics>,
}

impl Orchestrator {
    /// Build an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        config: ExecutionConfig,
        registry: VenueRegistry,
        metrics: MetricsTracker,
        router: SmartOrderRouter,
        executor: RouteExecutor,
        safety: Arc<SafetyGate>,
        telemetry: Arc<Telemetry>,
        predictive: Option<Arc<dyn PredictiveEngine>>,
    ) -> Self {
        Self {
            config,
            orders: DashMap::new(),
            next_order_id: AtomicU64::new(1),
            registry,
            liquidity: RwLock::new(LiquidityView::new()),
            metrics,
            router,
            executor,
            safety,
            telemetry,
            predictive,
            cancel_flags: DashMap::new(),
            analytics: Mutex::new(ExecutionAnalytics::default()),
        }
    }

    /// Venue registry, for callers registering/updating venue connections.
    #[must_use]
    pub fn registry(&self) -> &VenueRegistry {
        &self.registry
    }

    /// Replace a venue's liquidity snapshot ahead of the next routing decision.
    pub async fn update_liquidity(&self, snapshot: crate::liquidity::LiquiditySnapshot) {
        self.liquidity.write().await.update(snapshot);
    }

    /// Rolling execution-quality rollups across all orders worked so far.
    #[must_use]
    pub fn analytics(&self) -> ExecutionAnalytics {
        self.analytics.lock().clone()
    }

    /// Subscribes to the safety gate's mode transitions and, once a pause's
    /// grace period elapses, force-cancels every order still in flight. The
    /// caller owns the returned handle's lifetime (it runs until the
    /// orchestrator is dropped).
    #[must_use]
    pub fn spawn_safety_listener(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let mut transitions = self.safety.subscribe();
        tokio::spawn(async move {
            while let Ok(transition) = transitions.recv().await {
                if transition.to != TradingMode::Paused {
                    continue;
                }
                while !self.safety.grace_period_elapsed() {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    if self.safety.mode().await != TradingMode::Paused {
                        break;
                    }
                }
                if self.safety.mode().await != TradingMode::Paused {
                    continue;
                }
                self.cancel_in_flight_orders().await;
            }
        })
    }

    async fn cancel_in_flight_orders(&self) {
        let order_ids: Vec<OrderId> = self
            .orders
            .iter()
            .filter(|e| !e.value().status.is_terminal())
            .map(|e| *e.key())
            .collect();

        let mut cancelled = 0usize;
        for order_id in order_ids {
            if let Some(flag) = self.cancel_flags.get(&order_id) {
                flag.store(true, Ordering::Relaxed);
            }
            let Some(entry) = self.orders.get(&order_id) else { continue };
            let mut order = entry.value().clone();
            drop(entry);
            if order.status.is_terminal() {
                continue;
            }
            self.transition(&mut order, OrderStatus::Cancelled).await;
            self.orders.insert(order_id, order);
            self.record_terminal_status(OrderStatus::Cancelled);
            self.telemetry
                .emit(ExecutionEvent::SafetyEnforced {
                    order_id,
                    reason: "safety gate paused".to_string(),
                })
                .await;
            cancelled += 1;
        }

        self.telemetry
            .emit(ExecutionEvent::EmergencyStop {
                reason: "safety gate paused".to_string(),
                orders_cancelled: cancelled,
            })
            .await;
    }

    /// Accept, validate, route and execute an order end to end, returning
    /// its final internal id. The order remains queryable via
    /// [`Self::get_order`] after this call returns.
    pub async fn submit_order(&self, request: OrderRequest) -> ExecutionResult<OrderId> {
        let mode = self.safety.mode().await;
        if matches!(mode, TradingMode::Paused) && !request.metadata.allow_in_paused_mode {
            self.record_rejected();
            return Err(ExecutionError::TradingPaused {
                reason: "safety gate is paused".to_string(),
            });
        }

        if let Err(err) = self.validate(&request) {
            self.record_rejected();
            return Err(err);
        }

        let order_id = OrderId::new(self.next_order_id.fetch_add(1, Ordering::Relaxed));
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.cancel_flags.insert(order_id, Arc::clone(&cancel_flag));

        let now = now_ts();
        let mut order = Order {
            order_id,
            client_order_id: request.client_order_id.clone(),
            exchange_order_id: None,
            symbol: request.symbol,
            side: request.side,
            quantity: request.quantity,
            filled_quantity: Qty::ZERO,
            avg_fill_price: Px::ZERO,
            status: OrderStatus::Received,
            order_type: request.order_type,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            time_in_force: request.time_in_force,
            venue: request.venue.clone().unwrap_or_default(),
            strategy_id: request.strategy_id.clone(),
            created_at: now,
            updated_at: now,
            fills: Vec::new(),
        };
        self.transition(&mut order, OrderStatus::Validated).await;
        self.orders.insert(order_id, order);
        self.record_submitted();

        let simulate = matches!(mode, TradingMode::Simulation) && !request.metadata.is_simulation;
        if simulate {
            self.telemetry.emit(ExecutionEvent::ModeConverted { order_id }).await;
        }

        let algorithm = self.choose_algorithm(&request).await;
        let ctx = ExecCtx {
            order_id,
            algorithm,
            simulate,
            cancel_flag: &cancel_flag,
        };
        let result = self.work_order(&ctx, &request).await;

        if let Some(mut entry) = self.orders.get_mut(&order_id) {
            let terminal = if ctx.cancelled() {
                OrderStatus::Cancelled
            } else {
                match result {
                    Ok(()) => {
                        if entry.filled_quantity.as_i64() >= entry.quantity.as_i64() {
                            OrderStatus::Completed
                        } else if entry.filled_quantity.as_i64() > 0 {
                            OrderStatus::Partial
                        } else {
                            OrderStatus::Failed
                        }
                    }
                    Err(_) => {
                        if entry.filled_quantity.as_i64() > 0 {
                            OrderStatus::Partial
                        } else {
                            OrderStatus::Failed
                        }
                    }
                }
            };
            let mut order = entry.value().clone();
            drop(entry);
            self.transition(&mut order, terminal).await;
            self.orders.insert(order_id, order);
            self.record_terminal_status(terminal);
            self.record_algorithm(algorithm, terminal, self.get_order(order_id).map_or(Qty::ZERO, |o| o.filled_quantity));
        }

        self.cancel_flags.remove(&order_id);
        Ok(order_id)
    }

    /// Mark an order cancelled if it hasn't already reached a terminal state.
    pub async fn cancel_order(&self, order_id: OrderId) -> ExecutionResult<()> {
        let mut order = self
            .orders
            .get(&order_id)
            .map(|e| e.value().clone())
            .ok_or(ExecutionError::OrderNotFoundById {
                order_id: order_id.as_u64(),
            })?;
        if order.status.is_terminal() {
            return Err(ExecutionError::CannotCancelFilledOrder { id: order_id.as_u64() });
        }
        if let Some(flag) = self.cancel_flags.get(&order_id) {
            flag.store(true, Ordering::Relaxed);
        }
        self.transition(&mut order, OrderStatus::Cancelled).await;
        self.orders.insert(order_id, order);
        Ok(())
    }

    /// Look up a live or completed order by internal id.
    #[must_use]
    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|e| e.value().clone())
    }

    fn validate(&self, request: &OrderRequest) -> ExecutionResult<()> {
        if request.quantity.as_i64() <= 0 {
            return Err(ExecutionError::InvalidOrderParameters {
                reason: "quantity must be positive".to_string(),
            });
        }
        if request.quantity.as_i64() > self.config.algorithm_settings.max_order_size {
            return Err(ExecutionError::InvalidOrderParameters {
                reason: "quantity exceeds max order size".to_string(),
            });
        }
        Ok(())
    }

    async fn choose_algorithm(&self, request: &OrderRequest) -> ExecutionAlgorithm {
        if let Some(hint) = request.algorithm_hint {
            return hint;
        }
        if let Some(predictive) = &self.predictive {
            if let Ok((algo, confidence)) = predictive
                .suggest_algorithm(request.symbol, request.side, request.quantity)
                .await
            {
                if confidence >= self.config.safety.predictive_confidence_threshold {
                    return algo;
                }
            }
        }
        ExecutionAlgorithm::Direct
    }

    async fn work_order(&self, ctx: &ExecCtx<'_>, request: &OrderRequest) -> ExecutionResult<()> {
        self.set_status(ctx.order_id, OrderStatus::Routed).await;
        self.set_status(ctx.order_id, OrderStatus::Executing).await;

        match ctx.algorithm {
            ExecutionAlgorithm::Direct => self.execute_direct(ctx, request).await,
            ExecutionAlgorithm::Twap => self.execute_twap(ctx, request).await,
            ExecutionAlgorithm::Vwap => self.execute_vwap(ctx, request).await,
            ExecutionAlgorithm::Pov => self.execute_pov(ctx, request).await,
            ExecutionAlgorithm::Iceberg => self.execute_iceberg(ctx, request).await,
        }
    }

    async fn execute_direct(&self, ctx: &ExecCtx<'_>, request: &OrderRequest) -> ExecutionResult<()> {
        self.route_and_send(ctx, request).await
    }

    async fn execute_twap(&self, ctx: &ExecCtx<'_>, request: &OrderRequest) -> ExecutionResult<()> {
        let mut algo = TwapAlgorithm::new(request.clone(), default_params(request));
        while let Some(child) = algo.next_slice() {
            if ctx.cancelled() {
                break;
            }
            match self.route_and_send(ctx, &child).await {
                Ok(()) => algo.on_fill(child.quantity),
                Err(_) => algo.on_slice_failed(),
            }
        }
        Ok(())
    }

    async fn execute_vwap(&self, ctx: &ExecCtx<'_>, request: &OrderRequest) -> ExecutionResult<()> {
        let mut algo = VwapAlgorithm::new(request.clone(), default_params(request));
        let mut now = Utc::now();
        while let Some(child) = algo.next_slice(now) {
            if ctx.cancelled() {
                break;
            }
            if self.route_and_send(ctx, &child).await.is_ok() {
                algo.on_fill(child.quantity);
            }
            now += ChronoDuration::seconds(60);
        }
        Ok(())
    }

    async fn execute_pov(&self, ctx: &ExecCtx<'_>, request: &OrderRequest) -> ExecutionResult<()> {
        let mut algo = PovAlgorithm::new(request.clone(), default_params(request));
        let observed_volume = Qty::from_i64(request.quantity.as_i64() / 2);
        while let Some(child) = algo.next_slice(observed_volume) {
            if ctx.cancelled() {
                break;
            }
            if self.route_and_send(ctx, &child).await.is_ok() {
                algo.on_fill(child.quantity);
            } else {
                break;
            }
        }
        Ok(())
    }

    async fn execute_iceberg(&self, ctx: &ExecCtx<'_>, request: &OrderRequest) -> ExecutionResult<()> {
        let display_qty = Qty::from_i64(
            (request.quantity.as_i64() as f64
                * f64::from(self.config.algorithm_settings.iceberg_display_pct)
                / 1000.0) as i64,
        );
        let mut algo = IcebergAlgorithm::new(request.clone(), default_params(request), display_qty);
        let touch = request.limit_price;
        while let Some(child) = algo.next_slice(touch) {
            if ctx.cancelled() {
                break;
            }
            if self.route_and_send(ctx, &child).await.is_ok() {
                algo.on_fill(child.quantity);
                if algo.detection_risk_score() > self.config.telemetry.alert_threshold {
                    self.telemetry
                        .emit(ExecutionEvent::DetectionAlert {
                            order_id: ctx.order_id,
                            score: algo.detection_risk_score(),
                        })
                        .await;
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Routes `child` through the smart order router and dispatches the
    /// resulting allocations.
    async fn route_and_send(&self, ctx: &ExecCtx<'_>, child: &OrderRequest) -> ExecutionResult<()> {
        let decision = self.route_decision(child).await?;

        self.telemetry
            .emit(ExecutionEvent::Routed {
                order_id: ctx.order_id,
                symbol: child.symbol,
                venues: decision
                    .allocations
                    .iter()
                    .map(|a| a.venue_id.clone())
                    .collect::<Vec<_>>()
                    .join(","),
            })
            .await;

        self.dispatch_allocations(
            ctx,
            child.symbol,
            child.side,
            decision.allocations,
            child.limit_price,
            child.constraints.as_ref().and_then(|c| c.max_slippage_bps),
        )
        .await
    }

    async fn route_decision(&self, request: &OrderRequest) -> ExecutionResult<RoutingDecision> {
        let liquidity = self.liquidity.read().await;
        let objective = match request.metadata.urgency {
            Urgency::Critical => Objective::Speed,
            _ => Objective::Balanced,
        };
        self.router
            .route(
                request.symbol,
                request.side,
                request.quantity,
                request.metadata.urgency,
                request.limit_price,
                objective,
                &liquidity,
            )
            .await
    }

    /// Works a routing decision's allocations by priority bucket
    /// (`priority / 10`), highest first. Within a bucket every allocation is
    /// sent concurrently; a bucket that doesn't finish within
    /// [`GROUP_TIMEOUT`] or that has a failed allocation carries the
    /// unfilled quantity onto the next bucket's first allocation.
    async fn dispatch_allocations(
        &self,
        ctx: &ExecCtx<'_>,
        symbol: Symbol,
        side: Side,
        allocations: Vec<Allocation>,
        limit_price: Option<Px>,
        max_slippage_bps: Option<u32>,
    ) -> ExecutionResult<()> {
        if allocations.is_empty() {
            return Err(ExecutionError::NoVenuesAvailable);
        }

        let mut buckets: FxHashMap<u32, Vec<Allocation>> = FxHashMap::default();
        for alloc in allocations {
            buckets.entry(alloc.priority / 10).or_default().push(alloc);
        }
        let mut keys: Vec<u32> = buckets.keys().copied().collect();
        keys.sort_unstable_by(|a, b| b.cmp(a));

        let mut carry_over = Qty::ZERO;
        let mut last_err = None;
        let mut any_filled = false;

        for key in keys {
            if ctx.cancelled() {
                break;
            }
            let Some(mut group) = buckets.remove(&key) else { continue };
            if !carry_over.is_zero() {
                if let Some(first) = group.first_mut() {
                    first.qty = first.qty.add(carry_over);
                }
                carry_over = Qty::ZERO;
            }

            let mut set = tokio::task::JoinSet::new();
            for alloc in group {
                let venue_id = alloc.venue_id.clone();
                let qty = alloc.qty;
                let expected_price = alloc.expected_price;
                if ctx.simulate {
                    set.spawn(async move {
                        let outcome = RouteOutcome {
                            venue_id: venue_id.clone(),
                            venue_order_id: format!("sim-{venue_id}"),
                            latency_ms: 0.0,
                        };
                        (venue_id, qty, expected_price, Ok(outcome))
                    });
                } else {
                    let executor = self.executor.clone();
                    set.spawn(async move {
                        let result = executor.send(&venue_id, symbol, side, qty, limit_price).await;
                        (venue_id, qty, expected_price, result)
                    });
                }
            }

            let deadline = tokio::time::Instant::now() + GROUP_TIMEOUT;
            let mut group_err = None;
            loop {
                let Ok(next) = tokio::time::timeout_at(deadline, set.join_next()).await else {
                    break;
                };
                let Some(joined) = next else { break };
                match joined {
                    Ok((venue_id, qty, expected_price, Ok(outcome))) => {
                        any_filled = true;
                        match self
                            .record_fill(ctx, symbol, side, &venue_id, qty, expected_price, limit_price, max_slippage_bps, &outcome)
                            .await
                        {
                            Ok(()) => {}
                            Err(err) => {
                                group_err = Some(err);
                                break;
                            }
                        }
                    }
                    Ok((venue_id, qty, _expected_price, Err(err))) => {
                        carry_over = carry_over.add(qty);
                        last_err = Some(err);
                        tracing::warn!(venue = %venue_id, "allocation failed, redistributing to next group");
                    }
                    Err(join_err) => {
                        last_err = Some(ExecutionError::InternalError {
                            reason: join_err.to_string(),
                        });
                    }
                }
            }
            set.abort_all();
            if let Some(err) = group_err {
                return Err(err);
            }
        }

        if any_filled {
            Ok(())
        } else {
            Err(last_err.unwrap_or(ExecutionError::NoVenuesAvailable))
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_fill(
        &self,
        ctx: &ExecCtx<'_>,
        symbol: Symbol,
        side: Side,
        venue_id: &str,
        qty: Qty,
        expected_price: Px,
        limit_price: Option<Px>,
        max_slippage_bps: Option<u32>,
        outcome: &RouteOutcome,
    ) -> ExecutionResult<()> {
        let fill_price = self
            .liquidity
            .read()
            .await
            .venue(venue_id)
            .and_then(|s| s.walk(side, qty, limit_price))
            .map_or(expected_price, |w| w.avg_price);

        if let Some(mut entry) = self.orders.get_mut(&ctx.order_id) {
            let prior_notional = entry.avg_fill_price.as_f64() * entry.filled_quantity.as_f64();
            entry.filled_quantity = entry.filled_quantity.add(qty);
            let total_notional = prior_notional + fill_price.as_f64() * qty.as_f64();
            entry.avg_fill_price = if entry.filled_quantity.is_zero() {
                Px::ZERO
            } else {
                Px::new(total_notional / entry.filled_quantity.as_f64())
            };
            entry.fills.push(Fill {
                fill_id: outcome.venue_order_id.clone(),
                quantity: qty,
                price: fill_price,
                timestamp: now_ts(),
                is_maker: false,
                commission: 0,
                commission_asset: String::new(),
            });
        }

        self.telemetry
            .emit(ExecutionEvent::Filled {
                order_id: ctx.order_id,
                venue: venue_id.to_string(),
                qty: qty.as_i64(),
                price: fill_price.as_i64(),
            })
            .await;

        self.record_venue_fill(venue_id, qty, fill_price, expected_price);

        if let Some(max_bps) = max_slippage_bps {
            let reference = expected_price.as_f64();
            if reference > 0.0 {
                let direction = match side {
                    Side::Bid => 1.0,
                    Side::Ask => -1.0,
                };
                let slippage_bps = ((fill_price.as_f64() - reference) / reference) * 10_000.0 * direction;
                if slippage_bps > f64::from(max_bps) {
                    ctx.cancel_flag.store(true, Ordering::Relaxed);
                    return Err(ExecutionError::SlippageExceeded {
                        symbol: symbol.0,
                        expected: expected_price.as_i64(),
                        realized: fill_price.as_i64(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) {
        if let Some(mut entry) = self.orders.get_mut(&order_id) {
            let from = entry.status;
            entry.status = status;
            entry.updated_at = now_ts();
            drop(entry);
            self.telemetry
                .emit(ExecutionEvent::LifecycleChanged { order_id, from, to: status })
                .await;
        }
    }

    async fn transition(&self, order: &mut Order, to: OrderStatus) {
        let from = order.status;
        order.status = to;
        order.updated_at = now_ts();
        self.telemetry
            .emit(ExecutionEvent::LifecycleChanged {
                order_id: order.order_id,
                from,
                to,
            })
            .await;
    }

    fn record_rejected(&self) {
        let mut a = self.analytics.lock();
        a.total_orders += 1;
        a.rejected_orders += 1;
    }

    fn record_submitted(&self) {
        self.analytics.lock().total_orders += 1;
    }

    fn record_venue_fill(&self, venue_id: &str, qty: Qty, fill_price: Px, expected_price: Px) {
        let slippage_bps = if expected_price.as_f64() > 0.0 {
            ((fill_price.as_f64() - expected_price.as_f64()) / expected_price.as_f64()) * 10_000.0
        } else {
            0.0
        };

        let mut a = self.analytics.lock();
        a.total_volume += qty.as_i64().max(0) as u64;
        let n = a.total_volume.max(1) as f64;
        a.avg_slippage_bps += (slippage_bps - a.avg_slippage_bps) / n;

        let venue_stats = a.venues.entry(venue_id.to_string()).or_default();
        venue_stats.orders += 1;
        venue_stats.volume += qty.as_i64().max(0) as u64;
        let vn = venue_stats.orders.max(1) as f64;
        venue_stats.avg_slippage_bps += (slippage_bps - venue_stats.avg_slippage_bps) / vn;
    }

    fn record_terminal_status(&self, status: OrderStatus) {
        let mut a = self.analytics.lock();
        match status {
            OrderStatus::Completed => a.filled_orders += 1,
            OrderStatus::Partial => a.partial_orders += 1,
            OrderStatus::Cancelled => a.cancelled_orders += 1,
            OrderStatus::Expired => a.expired_orders += 1,
            OrderStatus::Failed => a.failed_orders += 1,
            OrderStatus::Received | OrderStatus::Validated | OrderStatus::Routed | OrderStatus::Executing => {}
        }
        a.fill_rate = if a.total_orders > 0 {
            a.filled_orders as f64 / a.total_orders as f64
        } else {
            0.0
        };
    }

    fn record_algorithm(&self, algorithm: ExecutionAlgorithm, status: OrderStatus, filled_qty: Qty) {
        let mut a = self.analytics.lock();
        let stats = a.algorithms.entry(algorithm.into()).or_default();
        stats.orders += 1;
        if status == OrderStatus::Completed {
            stats.completed += 1;
        }
        stats.volume += filled_qty.as_i64().max(0) as u64;
    }
}

fn default_params(request: &OrderRequest) -> AlgorithmParams {
    let now = Utc::now();
    AlgorithmParams {
        start_time: now,
        end_time: now + ChronoDuration::minutes(30),
        max_participation_rate: 1000,
        min_order_size: Qty::from_i64(1),
        max_order_size: request.quantity,
        price_limit: request.limit_price,
        urgency: request.metadata.urgency.as_algorithm_weight(),
        num_slices: request.constraints.as_ref().and_then(|c| c.max_slices),
    }
}

fn now_ts() -> Ts {
    Ts(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ProtectionVerdict;
    use crate::config::RetryConfig;
    use crate::liquidity::{AggregatedLevel, LiquiditySnapshot};
    use crate::metrics::MetricsTracker;
    use crate::route_executor::RouteExecutor;
    use crate::safety::SafetyGate;
    use crate::smart_router::SmartOrderRouter;
    use crate::telemetry::Telemetry;
    use crate::venue_registry::{VenueDescriptor, VenueRegistry, VenueStatus};
    use crate::{OrderMetadata, OrderType, TimeInForce};
    use async_trait::async_trait;
    use rustc_hash::FxHashMap;
    use services_common::{Px, Qty, Side, Symbol};
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;

    struct AlwaysFillsAdapter {
        id: String,
    }

    #[async_trait]
    impl crate::capability::VenueAdapter for AlwaysFillsAdapter {
        fn venue_id(&self) -> &str {
            &self.id
        }

        async fn submit(
            &self,
            _symbol: Symbol,
            _side: Side,
            _qty: Qty,
            _limit_price: Option<Px>,
        ) -> ExecutionResult<String> {
            Ok("venue-order-1".to_string())
        }

        async fn cancel(&self, _venue_order_id: &str) -> ExecutionResult<()> {
            Ok(())
        }
    }

    struct AllowAll;

    #[async_trait]
    impl crate::capability::ProtectionService for AllowAll {
        async fn evaluate(
            &self,
            _venue: &str,
            _symbol: Symbol,
            _qty: Qty,
            _limit_price: Option<Px>,
        ) -> ExecutionResult<ProtectionVerdict> {
            Ok(ProtectionVerdict::Allow)
        }
    }

    fn retry_config() -> RetryConfig {
        RetryConfig {
            max_retries: 0,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            backoff_multiplier: 1,
        }
    }

    async fn harness(symbol: Symbol) -> Orchestrator {
        let registry = VenueRegistry::new();
        registry
            .register(VenueDescriptor {
                venue_id: "a".to_string(),
                maker_fee_bps: 1,
                taker_fee_bps: 2,
                symbols: vec![symbol],
                is_dark_pool: false,
                is_backup: false,
                status: VenueStatus::Connected,
                trading_enabled: true,
            })
            .await;

        let mut adapters: StdHashMap<String, Arc<dyn crate::capability::VenueAdapter>> =
            StdHashMap::new();
        adapters.insert("a".to_string(), Arc::new(AlwaysFillsAdapter { id: "a".into() }));

        let metrics = MetricsTracker::new(0.1);
        let router = SmartOrderRouter::new(
            crate::config::RoutingConfig {
                max_splits: 3,
                split_threshold: 0,
                weight_cost: 0.25,
                weight_speed: 0.25,
                weight_size: 0.25,
                weight_reliability: 0.25,
                metrics_ewma_alpha: 0.1,
                min_liquidity_coverage: 0.8,
                quote_cache_ttl_ms: 5000,
                quote_cache_price_move_threshold: 0.005,
                mev_protection: true,
                dark_pool_access: false,
            },
            registry.clone(),
            metrics.clone(),
        );
        let executor = RouteExecutor::new(adapters, Some(Arc::new(AllowAll)), metrics.clone(), retry_config());
        let telemetry = Arc::new(Telemetry::new(true, 1.0));
        let safety = Arc::new(SafetyGate::new(TradingMode::Live, std::time::Duration::from_secs(10)));

        let orchestrator = Orchestrator::new(
            ExecutionConfig::default(),
            registry,
            metrics,
            router,
            executor,
            safety,
            telemetry,
            None,
        );
        orchestrator
            .update_liquidity(LiquiditySnapshot {
                venue_id: "a".to_string(),
                symbol,
                bids: vec![AggregatedLevel {
                    price: Px::from_i64(1000),
                    qty: Qty::from_i64(10_000),
                }],
                asks: vec![AggregatedLevel {
                    price: Px::from_i64(1001),
                    qty: Qty::from_i64(10_000),
                }],
                volume_24h: Qty::from_i64(1_000_000),
            })
            .await;
        orchestrator
    }

    fn order(symbol: Symbol, algorithm_hint: Option<ExecutionAlgorithm>) -> OrderRequest {
        OrderRequest {
            client_order_id: "c-1".into(),
            symbol,
            side: Side::Bid,
            quantity: Qty::from_i64(1_000),
            order_type: OrderType::Market,
            limit_price: Some(Px::from_i64(1001)),
            stop_price: None,
            time_in_force: TimeInForce::DAY,
            venue: None,
            strategy_id: "s".into(),
            algorithm_hint,
            priority: 5,
            constraints: None,
            metadata: OrderMetadata::default(),
            params: FxHashMap::default(),
        }
    }

    #[tokio::test]
    async fn direct_order_completes_and_records_fill() {
        let symbol = Symbol::new(42);
        let orchestrator = harness(symbol).await;
        let id = orchestrator
            .submit_order(order(symbol, Some(ExecutionAlgorithm::Direct)))
            .await
            .unwrap();

        let stored = orchestrator.get_order(id).unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(stored.filled_quantity.as_i64(), 1_000);
        assert!(stored.avg_fill_price.as_i64() > 0);

        let analytics = orchestrator.analytics();
        assert_eq!(analytics.filled_orders, 1);
        assert_eq!(analytics.total_volume, 1_000);
    }

    #[tokio::test]
    async fn paused_safety_mode_rejects_new_orders() {
        let symbol = Symbol::new(43);
        let orchestrator = harness(symbol).await;
        orchestrator
            .safety
            .set_mode(TradingMode::Paused, "test halt".into())
            .await;

        let err = orchestrator
            .submit_order(order(symbol, Some(ExecutionAlgorithm::Direct)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::TradingPaused { .. }));
    }

    #[tokio::test]
    async fn allow_in_paused_mode_overrides_the_gate() {
        let symbol = Symbol::new(46);
        let orchestrator = harness(symbol).await;
        orchestrator
            .safety
            .set_mode(TradingMode::Paused, "test halt".into())
            .await;

        let mut request = order(symbol, Some(ExecutionAlgorithm::Direct));
        request.metadata.allow_in_paused_mode = true;
        let id = orchestrator.submit_order(request).await.unwrap();
        let stored = orchestrator.get_order(id).unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn simulation_mode_fills_without_calling_the_adapter() {
        let symbol = Symbol::new(47);
        let orchestrator = harness(symbol).await;
        orchestrator
            .safety
            .set_mode(TradingMode::Simulation, "dry run".into())
            .await;

        let id = orchestrator
            .submit_order(order(symbol, Some(ExecutionAlgorithm::Direct)))
            .await
            .unwrap();
        let stored = orchestrator.get_order(id).unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(stored.fills[0].fill_id, "sim-a");
    }

    #[tokio::test]
    async fn invalid_quantity_is_rejected_before_routing() {
        let symbol = Symbol::new(44);
        let orchestrator = harness(symbol).await;
        let mut request = order(symbol, Some(ExecutionAlgorithm::Direct));
        request.quantity = Qty::ZERO;

        let err = orchestrator.submit_order(request).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidOrderParameters { .. }));
    }

    #[tokio::test]
    async fn cancel_marks_order_terminal() {
        let symbol = Symbol::new(45);
        let orchestrator = harness(symbol).await;
        let id = orchestrator
            .submit_order(order(symbol, Some(ExecutionAlgorithm::Direct)))
            .await
            .unwrap();

        let err = orchestrator.cancel_order(id).await.unwrap_err();
        assert!(matches!(err, ExecutionError::CannotCancelFilledOrder { .. }));
    }
}
