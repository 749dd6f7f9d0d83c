//! Safety gate
//!
//! Central kill-switch: holds the current [`TradingMode`] and, on a
//! transition into `Paused`, gives in-flight orders a grace period before
//! the orchestrator cancels them outright.

use crate::capability::{SafetyController, TradingMode};
use crate::telemetry::{ExecutionEvent, Telemetry};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// A mode transition, broadcast to anything watching in-flight orders.
#[derive(Debug, Clone, Copy)]
pub struct ModeTransition {
    /// Mode being left.
    pub from: TradingMode,
    /// Mode being entered.
    pub to: TradingMode,
}

/// Safety gate implementation backing [`SafetyController`].
pub struct SafetyGate {
    mode: RwLock<TradingMode>,
    grace_period: Duration,
    changed_at: RwLock<Instant>,
    transitions: broadcast::Sender<ModeTransition>,
    telemetry: Option<Arc<Telemetry>>,
}

impl SafetyGate {
    /// Build a gate starting in `initial_mode`, applying `grace_period`
    /// before a pause takes full effect on in-flight orders.
    #[must_use]
    pub fn new(initial_mode: TradingMode, grace_period: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            mode: RwLock::new(initial_mode),
            grace_period,
            changed_at: RwLock::new(Instant::now()),
            transitions: tx,
            telemetry: None,
        }
    }

    /// Attach a telemetry sink so mode changes are published.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Subscribe to mode transitions, e.g. to cascade-cancel in-flight orders.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ModeTransition> {
        self.transitions.subscribe()
    }

    /// How long ago the current mode was entered.
    #[must_use]
    pub fn time_in_mode(&self) -> Duration {
        self.changed_at.read().elapsed()
    }

    /// Whether the grace period for the current mode has elapsed, i.e.
    /// in-flight orders from a prior mode should now be force-cancelled.
    #[must_use]
    pub fn grace_period_elapsed(&self) -> bool {
        self.time_in_mode() >= self.grace_period
    }
}

#[async_trait]
impl SafetyController for SafetyGate {
    async fn mode(&self) -> TradingMode {
        *self.mode.read()
    }

    async fn set_mode(&self, mode: TradingMode, reason: String) {
        let from = {
            let mut guard = self.mode.write();
            let from = *guard;
            *guard = mode;
            from
        };
        if from == mode {
            return;
        }
        *self.changed_at.write() = Instant::now();
        let _ = self.transitions.send(ModeTransition { from, to: mode });

        if let Some(telemetry) = &self.telemetry {
            telemetry
                .emit(ExecutionEvent::SafetyModeChanged {
                    mode: format!("{mode:?}").to_lowercase(),
                    reason,
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mode_transition_is_broadcast() {
        let gate = SafetyGate::new(TradingMode::Live, Duration::from_secs(10));
        let mut rx = gate.subscribe();
        gate.set_mode(TradingMode::Paused, "operator request".into()).await;
        let transition = rx.recv().await.unwrap();
        assert_eq!(transition.from, TradingMode::Live);
        assert_eq!(transition.to, TradingMode::Paused);
    }

    #[tokio::test]
    async fn noop_transition_does_not_reset_clock() {
        let gate = SafetyGate::new(TradingMode::Live, Duration::from_secs(10));
        let before = gate.time_in_mode();
        gate.set_mode(TradingMode::Live, "no-op".into()).await;
        assert!(gate.time_in_mode() >= before);
    }

    #[tokio::test]
    async fn grace_period_not_elapsed_immediately() {
        let gate = SafetyGate::new(TradingMode::Live, Duration::from_secs(10));
        gate.set_mode(TradingMode::Paused, "halt".into()).await;
        assert!(!gate.grace_period_elapsed());
    }
}
