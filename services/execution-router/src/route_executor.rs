//! Route execution
//!
//! Sends a routed child order to its venue adapter, enforcing a per-venue
//! timeout and feeding the outcome back into the metrics tracker so future
//! routing decisions reflect observed reliability.

use crate::capability::{ProtectionService, ProtectionVerdict, VenueAdapter};
use crate::config::RetryConfig;
use crate::error::{ExecutionError, ExecutionResult};
use crate::metrics::{ExecutionOutcome, MetricsTracker};
use services_common::constants::safety::VENUE_TIMEOUT_SECS;
use services_common::{Px, Qty, Side, Symbol};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of sending a single child order to a venue.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    /// Venue the order was sent to.
    pub venue_id: String,
    /// Venue-assigned order id.
    pub venue_order_id: String,
    /// Round-trip latency observed for the submit call.
    pub latency_ms: f64,
}

/// Sends child orders to their venue, applying MEV protection and timeout
/// enforcement, and records the outcome for metrics.
#[derive(Clone)]
pub struct RouteExecutor {
    adapters: HashMap<String, Arc<dyn VenueAdapter>>,
    protection: Option<Arc<dyn ProtectionService>>,
    metrics: MetricsTracker,
    venue_timeout: Duration,
    retry: RetryConfig,
}

impl RouteExecutor {
    /// Build an executor over a set of venue adapters.
    #[must_use]
    pub fn new(
        adapters: HashMap<String, Arc<dyn VenueAdapter>>,
        protection: Option<Arc<dyn ProtectionService>>,
        metrics: MetricsTracker,
        retry: RetryConfig,
    ) -> Self {
        Self {
            adapters,
            protection,
            metrics,
            venue_timeout: Duration::from_secs(VENUE_TIMEOUT_SECS),
            retry,
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let multiplier = self.retry.backoff_multiplier.saturating_pow(attempt);
        let delay_ms = self
            .retry
            .initial_delay_ms
            .saturating_mul(u64::from(multiplier))
            .min(self.retry.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Submit one child order, retrying up to `retry.max_retries` times with
    /// exponential backoff (capped at `retry.max_delay_ms`) on failure. Each
    /// attempt individually enforces the per-venue timeout. Returns the last
    /// error once attempts are exhausted.
    pub async fn send(
        &self,
        venue_id: &str,
        symbol: Symbol,
        side: Side,
        qty: Qty,
        limit_price: Option<Px>,
    ) -> ExecutionResult<RouteOutcome> {
        let mut last_err = None;
        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.backoff_for(attempt - 1)).await;
            }
            match self.send_once(venue_id, symbol, side, qty, limit_price).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or(ExecutionError::VenueNotFound {
            venue: venue_id.to_string(),
        }))
    }

    async fn send_once(
        &self,
        venue_id: &str,
        symbol: Symbol,
        side: Side,
        qty: Qty,
        limit_price: Option<Px>,
    ) -> ExecutionResult<RouteOutcome> {
        let adapter = self
            .adapters
            .get(venue_id)
            .ok_or_else(|| ExecutionError::VenueNotFound {
                venue: venue_id.to_string(),
            })?
            .clone();

        if let Some(protection) = &self.protection {
            match protection.evaluate(venue_id, symbol, qty, limit_price).await? {
                ProtectionVerdict::Block => {
                    return Err(ExecutionError::MEVAttackDetected {
                        order_id: 0,
                        reason: format!("blocked by protection service for venue {venue_id}"),
                    });
                }
                ProtectionVerdict::Allow | ProtectionVerdict::RouteDark => {}
            }
        }

        let start = Instant::now();
        let result = tokio::time::timeout(
            self.venue_timeout,
            adapter.submit(symbol, side, qty, limit_price),
        )
        .await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(Ok(venue_order_id)) => {
                self.metrics.record(
                    venue_id,
                    ExecutionOutcome {
                        filled: 1.0,
                        reachable: 1.0,
                        failed: 0.0,
                        latency_ms,
                        cost_efficiency: 1.0,
                    },
                );
                Ok(RouteOutcome {
                    venue_id: venue_id.to_string(),
                    venue_order_id,
                    latency_ms,
                })
            }
            Ok(Err(err)) => {
                self.metrics.record(
                    venue_id,
                    ExecutionOutcome {
                        filled: 0.0,
                        reachable: 1.0,
                        failed: 1.0,
                        latency_ms,
                        cost_efficiency: 0.0,
                    },
                );
                Err(err)
            }
            Err(_) => {
                self.metrics.record(
                    venue_id,
                    ExecutionOutcome {
                        filled: 0.0,
                        reachable: 0.0,
                        failed: 1.0,
                        latency_ms: self.venue_timeout.as_secs_f64() * 1000.0,
                        cost_efficiency: 0.0,
                    },
                );
                Err(ExecutionError::Timeout {
                    context: format!("venue {venue_id}"),
                })
            }
        }
    }

    /// Cancel a previously submitted order at its venue.
    pub async fn cancel(&self, venue_id: &str, venue_order_id: &str) -> ExecutionResult<()> {
        let adapter = self
            .adapters
            .get(venue_id)
            .ok_or_else(|| ExecutionError::VenueNotFound {
                venue: venue_id.to_string(),
            })?;
        adapter.cancel(venue_order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyAdapter {
        id: String,
        failures_before_success: AtomicU32,
    }

    #[async_trait]
    impl VenueAdapter for FlakyAdapter {
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
            if self.failures_before_success.load(Ordering::SeqCst) > 0 {
                self.failures_before_success.fetch_sub(1, Ordering::SeqCst);
                return Err(ExecutionError::ExchangeSubmissionFailed {
                    reason: "simulated".into(),
                });
            }
            Ok("venue-order-1".to_string())
        }

        async fn cancel(&self, _venue_order_id: &str) -> ExecutionResult<()> {
            Ok(())
        }
    }

    fn retry_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2,
        }
    }

    fn executor(adapter: FlakyAdapter) -> RouteExecutor {
        let mut adapters: HashMap<String, Arc<dyn VenueAdapter>> = HashMap::new();
        adapters.insert(adapter.id.clone(), Arc::new(adapter));
        RouteExecutor::new(adapters, None, MetricsTracker::new(0.1), retry_config())
    }

    #[tokio::test]
    async fn successful_submit_is_recorded() {
        let executor = executor(FlakyAdapter {
            id: "a".into(),
            failures_before_success: AtomicU32::new(0),
        });
        let outcome = executor
            .send(
                "a",
                Symbol::new(1),
                Side::Bid,
                Qty::from_i64(100),
                Some(Px::from_i64(1000)),
            )
            .await
            .unwrap();
        assert_eq!(outcome.venue_order_id, "venue-order-1");
        assert!(executor.metrics.get("a").sample_count > 0);
    }

    #[tokio::test]
    async fn unknown_venue_is_rejected() {
        let executor = executor(FlakyAdapter {
            id: "a".into(),
            failures_before_success: AtomicU32::new(0),
        });
        let err = executor
            .send(
                "unknown",
                Symbol::new(1),
                Side::Bid,
                Qty::from_i64(100),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::VenueNotFound { .. }));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_and_eventually_succeeds() {
        let executor = executor(FlakyAdapter {
            id: "a".into(),
            failures_before_success: AtomicU32::new(1),
        });
        let outcome = executor
            .send("a", Symbol::new(1), Side::Bid, Qty::from_i64(100), None)
            .await
            .unwrap();
        assert_eq!(outcome.venue_order_id, "venue-order-1");
    }

    #[tokio::test]
    async fn failure_exhausting_all_retries_is_propagated() {
        let executor = executor(FlakyAdapter {
            id: "a".into(),
            failures_before_success: AtomicU32::new(100),
        });
        let err = executor
            .send("a", Symbol::new(1), Side::Bid, Qty::from_i64(100), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ExchangeSubmissionFailed { .. }));
    }
}
