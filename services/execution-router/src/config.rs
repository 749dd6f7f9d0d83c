//! Execution router configuration

use services_common::constants::{
    fixed_point::{SCALE_2, SCALE_3},
    network::{MAX_RETRY_ATTEMPTS, MAX_RETRY_DELAY_MS},
    routing::{
        DEFAULT_WEIGHT_COST, DEFAULT_WEIGHT_RELIABILITY, DEFAULT_WEIGHT_SIZE,
        DEFAULT_WEIGHT_SPEED, METRICS_EWMA_ALPHA, MIN_LIQUIDITY_COVERAGE,
        QUOTE_CACHE_PRICE_MOVE_THRESHOLD, QUOTE_CACHE_TTL_MS,
    },
    safety::{MODE_CHANGE_GRACE_SECS, PREDICTIVE_CONFIDENCE_THRESHOLD},
    time::SECS_PER_MINUTE,
    trading::MIN_ORDER_QTY,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Execution router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Default venue
    pub default_venue: String,

    /// Venue configurations
    pub venues: FxHashMap<String, VenueConfig>,

    /// Algorithm settings
    pub algorithm_settings: AlgorithmSettings,

    /// Risk checks
    pub risk_checks: RiskCheckConfig,

    /// Retry configuration
    pub retry_config: RetryConfig,

    /// Order cache size
    pub order_cache_size: usize,

    /// Venue timeout in milliseconds
    pub venue_timeout_ms: u64,

    /// Smart order router settings
    pub routing: RoutingConfig,

    /// Safety gate settings
    pub safety: SafetyConfig,

    /// Telemetry settings
    pub telemetry: TelemetryConfig,
}

/// Smart order router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Maximum number of venues a single order may be split across
    pub max_splits: usize,
    /// Order size (fixed-point) above which the router considers splitting at all
    pub split_threshold: i64,
    /// Scoring weights, keyed by factor name: cost/speed/size/reliability
    pub weight_cost: f64,
    pub weight_speed: f64,
    pub weight_size: f64,
    pub weight_reliability: f64,
    /// EWMA smoothing factor for venue metrics
    pub metrics_ewma_alpha: f64,
    /// Minimum fraction of requested depth that must be coverable before routing proceeds
    pub min_liquidity_coverage: f64,
    /// Routing-decision cache TTL in milliseconds
    pub quote_cache_ttl_ms: u64,
    /// Reference-price move fraction that invalidates a cached decision
    pub quote_cache_price_move_threshold: f64,
    /// Enable MEV protection wrapping for routed child orders
    pub mev_protection: bool,
    /// Allow routing to dark-pool venues
    pub dark_pool_access: bool,
}

/// Safety gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Starting mode name: "live", "simulation" or "paused"
    pub initial_mode: String,
    /// Seconds a mode change waits before cancelling/affecting in-flight orders
    pub grace_period_secs: u64,
    /// Confidence the predictive engine must report before its algorithm pick is trusted
    pub predictive_confidence_threshold: f64,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Enable telemetry event publication
    pub enabled: bool,
    /// Fraction of routine events to sample (1.0 = publish all)
    pub sample_rate: f64,
    /// Detection-risk score above which an alert event is published
    pub alert_threshold: f64,
}

/// Venue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Venue name
    pub name: String,

    /// API endpoint
    pub api_url: String,

    /// WebSocket endpoint
    pub ws_url: Option<String>,

    /// API credentials
    pub api_key: String,
    pub api_secret: String,

    /// Rate limits
    pub max_orders_per_second: u32,
    pub max_cancels_per_second: u32,

    /// Supported symbols
    pub symbols: Vec<String>,

    /// Fee structure
    pub maker_fee_bps: i32,
    pub taker_fee_bps: i32,
}

/// Algorithm settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmSettings {
    /// Default slice duration (seconds)
    pub default_slice_duration: u64,

    /// Maximum participation rate (fixed-point: `SCALE_3` = 100%)
    pub max_participation_rate: i32,

    /// Minimum order size (fixed-point)
    pub min_order_size: i64,

    /// Maximum order size (fixed-point)
    pub max_order_size: i64,

    /// VWAP lookback period (minutes)
    pub vwap_lookback_minutes: u32,

    /// Iceberg display percentage (fixed-point: `SCALE_3` = 100%)
    pub iceberg_display_pct: i32,
}

/// Risk check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckConfig {
    /// Enable pre-trade risk checks
    pub enable_pretrade_checks: bool,

    /// Maximum order value (fixed-point)
    pub max_order_value: i64,

    /// Maximum position value (fixed-point)
    pub max_position_value: i64,

    /// Price tolerance percentage (fixed-point: `SCALE_2` = 100%)
    pub price_tolerance_pct: i32,

    /// Reject orders outside market hours
    pub check_market_hours: bool,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts
    pub max_retries: u32,

    /// Initial retry delay (milliseconds)
    pub initial_delay_ms: u64,

    /// Maximum retry delay (milliseconds)
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        const DEFAULT_ORDER_CACHE_SIZE: usize = 10000;
        const DEFAULT_VENUE_TIMEOUT_MS: u64 = 5000;
        
        Self {
            default_venue: "binance".to_string(),
            venues: FxHashMap::default(),
            algorithm_settings: AlgorithmSettings {
                default_slice_duration: SECS_PER_MINUTE,
                // SAFETY: SCALE_3 / 10 fits in i32
                max_participation_rate: (SCALE_3 / 10) as i32, // 10%
                min_order_size: MIN_ORDER_QTY,                 // 1 unit
                max_order_size: MIN_ORDER_QTY * 1000,          // 1000 units
                vwap_lookback_minutes: 30,
                // SAFETY: SCALE_3 / 5 fits in i32
                iceberg_display_pct: (SCALE_3 / 5) as i32, // 20%
            },
            risk_checks: RiskCheckConfig {
                enable_pretrade_checks: true,
                max_order_value: 1000000_0000,     // 100K value
                max_position_value: 10000000_0000, // 1M value
                // SAFETY: SCALE_2 * 5 fits in i32
                price_tolerance_pct: (SCALE_2 * 5) as i32, // 5%
                check_market_hours: true,
            },
            retry_config: RetryConfig {
                max_retries: MAX_RETRY_ATTEMPTS,
                initial_delay_ms: 1000,
                max_delay_ms: MAX_RETRY_DELAY_MS,
                backoff_multiplier: 2,
            },
            order_cache_size: DEFAULT_ORDER_CACHE_SIZE,
            venue_timeout_ms: DEFAULT_VENUE_TIMEOUT_MS,
            routing: RoutingConfig {
                max_splits: 5,
                split_threshold: MIN_ORDER_QTY * 10,
                weight_cost: DEFAULT_WEIGHT_COST,
                weight_speed: DEFAULT_WEIGHT_SPEED,
                weight_size: DEFAULT_WEIGHT_SIZE,
                weight_reliability: DEFAULT_WEIGHT_RELIABILITY,
                metrics_ewma_alpha: METRICS_EWMA_ALPHA,
                min_liquidity_coverage: MIN_LIQUIDITY_COVERAGE,
                quote_cache_ttl_ms: QUOTE_CACHE_TTL_MS,
                quote_cache_price_move_threshold: QUOTE_CACHE_PRICE_MOVE_THRESHOLD,
                mev_protection: true,
                dark_pool_access: false,
            },
            safety: SafetyConfig {
                initial_mode: "live".to_string(),
                grace_period_secs: MODE_CHANGE_GRACE_SECS,
                predictive_confidence_threshold: PREDICTIVE_CONFIDENCE_THRESHOLD,
            },
            telemetry: TelemetryConfig {
                enabled: true,
                sample_rate: 1.0,
                alert_threshold: 0.7,
            },
        }
    }
}
