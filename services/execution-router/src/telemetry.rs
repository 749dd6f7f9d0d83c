//! Execution telemetry
//!
//! Publishes lifecycle, fill, routing and safety events over the shared
//! event bus so downstream consumers (dashboards, risk, analytics) can
//! observe the router without being wired into its internals.

use crate::{OrderId, OrderStatus};
use services_common::{BusMessage, EventBus, EventBusConfig, Symbol};
use std::sync::Arc;

/// Event published by the execution router.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// An order transitioned to a new lifecycle state.
    LifecycleChanged {
        /// Order affected.
        order_id: OrderId,
        /// Previous status.
        from: OrderStatus,
        /// New status.
        to: OrderStatus,
    },
    /// A child order filled (fully or partially).
    Filled {
        /// Parent order.
        order_id: OrderId,
        /// Venue the fill occurred at.
        venue: String,
        /// Fixed-point fill quantity.
        qty: i64,
        /// Fixed-point fill price.
        price: i64,
    },
    /// A routing decision was produced for an order.
    Routed {
        /// Order affected.
        order_id: OrderId,
        /// Symbol routed.
        symbol: Symbol,
        /// Venue(s) the decision targeted, comma-joined for display.
        venues: String,
    },
    /// The safety gate changed trading mode.
    SafetyModeChanged {
        /// New mode name.
        mode: String,
        /// Why the mode changed.
        reason: String,
    },
    /// An iceberg run's detection-risk score cleared the alert threshold.
    DetectionAlert {
        /// Order affected.
        order_id: OrderId,
        /// Detection-risk score at the time of the alert.
        score: f64,
    },
    /// An order was silently converted to simulation because the safety
    /// gate was in `Simulation` mode at submission time.
    ModeConverted {
        /// Order affected.
        order_id: OrderId,
    },
    /// The safety gate moved to `Paused` or a predictive engine flagged an
    /// emergency condition; every non-terminal order was cancelled.
    EmergencyStop {
        /// Why the stop was triggered.
        reason: String,
        /// Orders cancelled as a result.
        orders_cancelled: usize,
    },
    /// A safety-driven cancellation was applied to a single order (the
    /// per-order complement of `EmergencyStop`'s aggregate count).
    SafetyEnforced {
        /// Order affected.
        order_id: OrderId,
        /// Why the order was cancelled.
        reason: String,
    },
}

impl BusMessage for ExecutionEvent {
    fn topic(&self) -> &str {
        match self {
            Self::LifecycleChanged { .. } => "execution.lifecycle",
            Self::Filled { .. } => "execution.fills",
            Self::Routed { .. } => "execution.routing",
            Self::SafetyModeChanged { .. } => "execution.safety",
            Self::DetectionAlert { .. } => "execution.detection",
            Self::ModeConverted { .. } => "execution.lifecycle",
            Self::EmergencyStop { .. } => "execution.safety",
            Self::SafetyEnforced { .. } => "execution.safety",
        }
    }

    fn priority(&self) -> u8 {
        match self {
            Self::SafetyModeChanged { .. } => 0,
            Self::EmergencyStop { .. } => 0,
            Self::SafetyEnforced { .. } => 8,
            Self::DetectionAlert { .. } => 16,
            Self::Filled { .. } => 32,
            Self::LifecycleChanged { .. } => 64,
            Self::ModeConverted { .. } => 64,
            Self::Routed { .. } => 96,
        }
    }
}

/// Thin wrapper around an [`EventBus`] that applies the telemetry config's
/// sample rate and enable flag before publishing.
pub struct Telemetry {
    bus: Arc<EventBus<ExecutionEvent>>,
    enabled: bool,
    sample_rate: f64,
}

impl Telemetry {
    /// Build a telemetry publisher over a fresh event bus.
    #[must_use]
    pub fn new(enabled: bool, sample_rate: f64) -> Self {
        Self {
            bus: Arc::new(EventBus::new(EventBusConfig::default())),
            enabled,
            sample_rate: sample_rate.clamp(0.0, 1.0),
        }
    }

    /// The underlying bus, for subscribing from outside the router.
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus<ExecutionEvent>> {
        Arc::clone(&self.bus)
    }

    /// Publish an event, subject to sampling. High-priority events
    /// (priority < 32: safety/detection/fills) always publish regardless of
    /// sample rate.
    pub async fn emit(&self, event: ExecutionEvent) {
        if !self.enabled {
            return;
        }
        let always = event.priority() < 32;
        if !always && !self.sampled() {
            return;
        }
        if let Err(err) = self.bus.publish(event).await {
            tracing::debug!(error = %err, "telemetry publish dropped");
        }
    }

    fn sampled(&self) -> bool {
        if self.sample_rate >= 1.0 {
            return true;
        }
        rand::random::<f64>() < self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_telemetry_emits_nothing() {
        let telemetry = Telemetry::new(false, 1.0);
        let mut rx = telemetry.bus().subscribe("execution.safety").await.unwrap();
        telemetry
            .emit(ExecutionEvent::SafetyModeChanged {
                mode: "paused".into(),
                reason: "test".into(),
            })
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn high_priority_events_always_publish() {
        let telemetry = Telemetry::new(true, 0.0);
        let mut rx = telemetry.bus().subscribe("execution.safety").await.unwrap();
        telemetry
            .emit(ExecutionEvent::SafetyModeChanged {
                mode: "paused".into(),
                reason: "test".into(),
            })
            .await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.message.topic(), "execution.safety");
    }
}
