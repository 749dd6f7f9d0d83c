//! Execution router service entry point
//!
//! Wires venue registry, smart order router, safety gate and telemetry into
//! an [`Orchestrator`], seeds it with demo venues and a synthetic liquidity
//! feed, and runs until interrupted.

use anyhow::Result;
use execution_router::config::{AlgorithmSettings, ExecutionConfig, RetryConfig, RiskCheckConfig, VenueConfig};
use execution_router::capability::{ProtectionVerdict, ProtectionService, TradingMode, VenueAdapter};
use execution_router::error::ExecutionResult;
use execution_router::liquidity::{AggregatedLevel, LiquiditySnapshot};
use execution_router::metrics::MetricsTracker;
use execution_router::orchestrator::Orchestrator;
use execution_router::route_executor::RouteExecutor;
use execution_router::safety::SafetyGate;
use execution_router::smart_router::SmartOrderRouter;
use execution_router::telemetry::Telemetry;
use execution_router::venue_registry::{VenueDescriptor, VenueRegistry, VenueStatus};
use execution_router::{ExecutionAlgorithm, OrderRequest, OrderType, TimeInForce};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use services_common::constants;
use services_common::{Px, Qty, Side, Symbol};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "execution-router";
const LIQUIDITY_FEED_INTERVAL_SECS: u64 = 1;
const DEFAULT_MAX_RETRIES: u32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    info!("Starting Execution Router Service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    let registry = VenueRegistry::new();
    let mut adapters: HashMap<String, Arc<dyn VenueAdapter>> = HashMap::new();
    for (venue_id, venue_config) in &config.venues {
        registry
            .register(VenueDescriptor {
                venue_id: venue_id.clone(),
                maker_fee_bps: venue_config.maker_fee_bps,
                taker_fee_bps: venue_config.taker_fee_bps,
                symbols: venue_config.symbols.iter().map(|s| intern_symbol(s)).collect(),
                is_dark_pool: false,
                is_backup: false,
                status: VenueStatus::Connected,
                trading_enabled: true,
            })
            .await;
        adapters.insert(
            venue_id.clone(),
            Arc::new(SimulatedVenueAdapter::new(venue_id.clone())),
        );
    }

    let metrics = MetricsTracker::new(config.routing.metrics_ewma_alpha);
    let router = SmartOrderRouter::new(config.routing.clone(), registry.clone(), metrics.clone());
    let protection: Option<Arc<dyn ProtectionService>> = if config.routing.mev_protection {
        Some(Arc::new(PassthroughProtection))
    } else {
        None
    };
    let executor = RouteExecutor::new(adapters, protection, metrics.clone(), config.retry_config.clone());

    let telemetry = Arc::new(Telemetry::new(config.telemetry.enabled, config.telemetry.sample_rate));
    let initial_mode = match config.safety.initial_mode.as_str() {
        "simulation" => TradingMode::Simulation,
        "paused" => TradingMode::Paused,
        _ => TradingMode::Live,
    };
    let safety = Arc::new(
        SafetyGate::new(initial_mode, Duration::from_secs(config.safety.grace_period_secs))
            .with_telemetry(Arc::clone(&telemetry)),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        registry,
        metrics,
        router,
        executor,
        safety,
        telemetry,
        None,
    ));

    let feed_handle = spawn_liquidity_feed(Arc::clone(&orchestrator), config.venues.clone());
    let safety_handle = Arc::clone(&orchestrator).spawn_safety_listener();

    info!("Execution router ready with {} venue(s)", config.venues.len());

    tokio::select! {
        result = feed_handle => {
            if let Err(err) = result {
                error!(error = %err, "liquidity feed task ended unexpectedly");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }
    safety_handle.abort();

    info!("Execution router service shut down");
    Ok(())
}

/// Periodically synthesizes a liquidity snapshot for every configured venue
/// and symbol so the router always has a current book to score against.
fn spawn_liquidity_feed(
    orchestrator: Arc<Orchestrator>,
    venues: FxHashMap<String, VenueConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(LIQUIDITY_FEED_INTERVAL_SECS));
        loop {
            interval.tick().await;
            for (venue_id, venue_config) in &venues {
                for symbol_name in &venue_config.symbols {
                    let symbol = intern_symbol(symbol_name);
                    orchestrator
                        .update_liquidity(LiquiditySnapshot {
                            venue_id: venue_id.clone(),
                            symbol,
                            bids: vec![AggregatedLevel {
                                price: Px::from_i64(100_0000),
                                qty: Qty::from_i64(10_000),
                            }],
                            asks: vec![AggregatedLevel {
                                price: Px::from_i64(100_0100),
                                qty: Qty::from_i64(10_000),
                            }],
                            volume_24h: Qty::from_i64(1_000_000),
                        })
                        .await;
                }
            }
        }
    })
}

/// Deterministically maps a human-readable symbol name to a [`Symbol`] id.
/// Venue adapters outside this crate are responsible for the authoritative
/// mapping; this is a stand-in so the demo wiring has something to route on.
fn intern_symbol(name: &str) -> Symbol {
    let mut hash: u32 = 2166136261;
    for b in name.bytes() {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(16777619);
    }
    Symbol::new(hash)
}

/// Venue adapter that always fills immediately at the requested price.
/// Stands in for a real exchange connector.
struct SimulatedVenueAdapter {
    venue_id: String,
}

impl SimulatedVenueAdapter {
    fn new(venue_id: String) -> Self {
        Self { venue_id }
    }
}

#[async_trait]
impl VenueAdapter for SimulatedVenueAdapter {
    fn venue_id(&self) -> &str {
        &self.venue_id
    }

    async fn submit(
        &self,
        _symbol: Symbol,
        _side: Side,
        _qty: Qty,
        _limit_price: Option<Px>,
    ) -> ExecutionResult<String> {
        Ok(format!("{}-{}", self.venue_id, uuid_like()))
    }

    async fn cancel(&self, _venue_order_id: &str) -> ExecutionResult<()> {
        Ok(())
    }
}

fn uuid_like() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// MEV protection that allows every order; a real deployment plugs in a
/// mempool-monitoring implementation behind the same trait.
struct PassthroughProtection;

#[async_trait]
impl ProtectionService for PassthroughProtection {
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

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info", SERVICE_NAME.replace('-', "_")).into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_thread_ids(true),
        )
        .init();

    Ok(())
}

/// Loads configuration from environment variables, falling back to
/// [`ExecutionConfig::default`] for anything unset.
fn load_config() -> Result<ExecutionConfig> {
    let mut config = ExecutionConfig::default();
    let mut venues = FxHashMap::default();

    let binance_enabled = env_bool("BINANCE_ENABLED", true)?;
    if binance_enabled {
        venues.insert(
            "binance".to_string(),
            VenueConfig {
                name: "binance".to_string(),
                api_url: env_or("BINANCE_API_URL", "https://api.binance.com"),
                ws_url: Some(env_or("BINANCE_WS_URL", "wss://stream.binance.com:9443/ws")),
                api_key: env_or("BINANCE_API_KEY", ""),
                api_secret: env_or("BINANCE_API_SECRET", ""),
                max_orders_per_second: env_or_parse(
                    "BINANCE_MAX_ORDERS_PER_SEC",
                    constants::trading::DEFAULT_MAX_ORDERS_PER_SEC,
                ),
                max_cancels_per_second: env_or_parse(
                    "BINANCE_MAX_CANCELS_PER_SEC",
                    constants::trading::DEFAULT_MAX_ORDERS_PER_SEC,
                ),
                symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
                maker_fee_bps: i32::try_from(constants::trading::MAKER_FEE_BP).unwrap_or(0),
                taker_fee_bps: i32::try_from(constants::trading::TAKER_FEE_BP).unwrap_or(0),
            },
        );
    }

    let zerodha_enabled = env_bool("ZERODHA_ENABLED", true)?;
    if zerodha_enabled {
        const DEFAULT_ZERODHA_ORDERS_PER_SEC: u32 = 5;
        venues.insert(
            "zerodha".to_string(),
            VenueConfig {
                name: "zerodha".to_string(),
                api_url: env_or("ZERODHA_API_URL", "https://api.kite.trade"),
                ws_url: Some(env_or("ZERODHA_WS_URL", "wss://ws.kite.trade")),
                api_key: env_or("ZERODHA_API_KEY", ""),
                api_secret: env_or("ZERODHA_API_SECRET", ""),
                max_orders_per_second: env_or_parse(
                    "ZERODHA_MAX_ORDERS_PER_SEC",
                    DEFAULT_ZERODHA_ORDERS_PER_SEC,
                ),
                max_cancels_per_second: env_or_parse(
                    "ZERODHA_MAX_CANCELS_PER_SEC",
                    DEFAULT_ZERODHA_ORDERS_PER_SEC,
                ),
                symbols: vec!["NIFTY".to_string(), "BANKNIFTY".to_string()],
                maker_fee_bps: 3,
                taker_fee_bps: 3,
            },
        );
    }

    if venues.is_empty() {
        venues.insert(
            "mock".to_string(),
            VenueConfig {
                name: "mock".to_string(),
                api_url: "http://localhost:8080".to_string(),
                ws_url: None,
                api_key: String::new(),
                api_secret: String::new(),
                max_orders_per_second: 100,
                max_cancels_per_second: 100,
                symbols: vec!["TEST".to_string()],
                maker_fee_bps: 10,
                taker_fee_bps: 20,
            },
        );
    }

    config.default_venue = env_or(
        "DEFAULT_VENUE",
        venues.keys().next().cloned().unwrap_or_else(|| "mock".to_string()).as_str(),
    );
    config.venues = venues;

    config.algorithm_settings = AlgorithmSettings {
        default_slice_duration: env_or_parse("ALGO_SLICE_DURATION", constants::time::SECS_PER_MINUTE),
        max_participation_rate: env_or_parse(
            "ALGO_MAX_PARTICIPATION_RATE",
            i32::try_from(constants::fixed_point::SCALE_3 / 10).unwrap_or(100),
        ),
        min_order_size: env_or_parse("ALGO_MIN_ORDER_SIZE", constants::trading::MIN_ORDER_QTY),
        max_order_size: env_or_parse(
            "ALGO_MAX_ORDER_SIZE",
            constants::trading::MIN_ORDER_QTY * 1000,
        ),
        vwap_lookback_minutes: env_or_parse("ALGO_VWAP_LOOKBACK", 30),
        iceberg_display_pct: env_or_parse(
            "ALGO_ICEBERG_DISPLAY_PCT",
            i32::try_from(constants::fixed_point::SCALE_3 / 5).unwrap_or(200),
        ),
    };

    config.risk_checks = RiskCheckConfig {
        enable_pretrade_checks: env_bool("ENABLE_PRETRADE_CHECKS", true)?,
        max_order_value: env_or_parse("MAX_ORDER_VALUE", 1_000_000_0000),
        max_position_value: env_or_parse("MAX_POSITION_VALUE", 10_000_000_0000),
        price_tolerance_pct: env_or_parse(
            "PRICE_TOLERANCE_PCT",
            (constants::fixed_point::SCALE_2 * 5) as i32,
        ),
        check_market_hours: env_bool("CHECK_MARKET_HOURS", true)?,
    };

    config.retry_config = RetryConfig {
        max_retries: env_or_parse("MAX_RETRIES", DEFAULT_MAX_RETRIES),
        initial_delay_ms: env_or_parse("RETRY_INITIAL_DELAY_MS", 1000),
        max_delay_ms: env_or_parse("RETRY_MAX_DELAY_MS", constants::network::MAX_RETRY_DELAY_MS),
        backoff_multiplier: env_or_parse("RETRY_BACKOFF_MULTIPLIER", 2),
    };

    config.order_cache_size = env_or_parse("ORDER_CACHE_SIZE", config.order_cache_size);
    config.venue_timeout_ms = env_or_parse("VENUE_TIMEOUT_MS", config.venue_timeout_ms);

    config.routing.mev_protection = env_bool("MEV_PROTECTION", config.routing.mev_protection)?;
    config.routing.dark_pool_access = env_bool("DARK_POOL_ACCESS", config.routing.dark_pool_access)?;
    config.routing.max_splits = env_or_parse("ROUTING_MAX_SPLITS", config.routing.max_splits);

    config.safety.initial_mode = env_or("TRADING_MODE", &config.safety.initial_mode);
    config.safety.grace_period_secs =
        env_or_parse("SAFETY_GRACE_PERIOD_SECS", config.safety.grace_period_secs);

    config.telemetry.enabled = env_bool("TELEMETRY_ENABLED", config.telemetry.enabled)?;
    config.telemetry.sample_rate = env_or_parse("TELEMETRY_SAMPLE_RATE", config.telemetry.sample_rate);

    Ok(config)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(val) => val
            .parse::<bool>()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// A sample order, for demonstrating submission through the orchestrator
/// from an external caller (CLI, gRPC layer, etc. wired outside this crate).
#[allow(dead_code)]
fn sample_order() -> OrderRequest {
    OrderRequest {
        client_order_id: "demo-1".to_string(),
        symbol: intern_symbol("BTCUSDT"),
        side: Side::Bid,
        quantity: Qty::from_i64(1_000),
        order_type: OrderType::Limit,
        limit_price: Some(Px::from_i64(100_0000)),
        stop_price: None,
        time_in_force: TimeInForce::DAY,
        venue: None,
        strategy_id: "demo".to_string(),
        algorithm_hint: Some(ExecutionAlgorithm::Twap),
        priority: 5,
        constraints: None,
        metadata: execution_router::OrderMetadata::default(),
        params: FxHashMap::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_loads_with_defaults() {
        let config = load_config();
        assert!(config.is_ok());
        let config = config.unwrap();
        assert!(!config.venues.is_empty());
    }

    #[test]
    fn symbol_interning_is_deterministic() {
        assert_eq!(intern_symbol("BTCUSDT"), intern_symbol("BTCUSDT"));
        assert_ne!(intern_symbol("BTCUSDT"), intern_symbol("ETHUSDT"));
    }
}
