//! Venue registration and eligibility

use crate::metrics::VenueMetrics;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use services_common::Symbol;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Connection health as last observed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VenueStatus {
    /// Not connected.
    Disconnected,
    /// Connected and accepting order flow.
    Connected,
    /// Connected but currently unhealthy (elevated errors/latency).
    Degraded,
}

/// Static and semi-static facts about a venue the router needs to know
/// before it can be considered as a routing candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueDescriptor {
    /// Venue identifier, used as the routing/metrics key everywhere.
    pub venue_id: String,
    /// Maker fee in basis points.
    pub maker_fee_bps: i32,
    /// Taker fee in basis points.
    pub taker_fee_bps: i32,
    /// Symbols this venue quotes.
    pub symbols: Vec<Symbol>,
    /// Whether this is a displayed lit venue or a dark pool.
    pub is_dark_pool: bool,
    /// Is this venue a designated fallback-only route.
    pub is_backup: bool,
    /// Current connection status.
    pub status: VenueStatus,
    /// Operator kill switch, independent of connection health.
    pub trading_enabled: bool,
}

impl VenueDescriptor {
    /// A venue is eligible for routing when operational, trading-enabled,
    /// quoting the requested symbol, and (when live metrics exist) meeting
    /// the minimum fill-rate/reliability floor. `Critical`-urgency orders
    /// additionally require average latency at or below 100ms.
    #[must_use]
    pub fn is_eligible(
        &self,
        symbol: Symbol,
        allow_dark_pool: bool,
        metrics: &VenueMetrics,
        urgency: crate::Urgency,
    ) -> bool {
        if self.status == VenueStatus::Disconnected || !self.trading_enabled {
            return false;
        }
        if self.is_dark_pool && !allow_dark_pool {
            return false;
        }
        if !self.symbols.contains(&symbol) {
            return false;
        }
        if metrics.sample_count > 0
            && (metrics.fill_rate < 0.5 || metrics.reliability_score() < 0.5)
        {
            return false;
        }
        if urgency == crate::Urgency::Critical && metrics.latency_ms > 100.0 {
            return false;
        }
        true
    }
}

/// Registry of all known venues, concurrently readable/writable.
#[derive(Debug, Clone)]
pub struct VenueRegistry {
    venues: Arc<RwLock<FxHashMap<String, VenueDescriptor>>>,
}

impl Default for VenueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VenueRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            venues: Arc::new(RwLock::new(FxHashMap::default())),
        }
    }

    /// Register or replace a venue.
    pub async fn register(&self, descriptor: VenueDescriptor) {
        self.venues
            .write()
            .await
            .insert(descriptor.venue_id.clone(), descriptor);
    }

    /// Update a venue's connection status.
    pub async fn set_status(&self, venue_id: &str, status: VenueStatus) {
        if let Some(v) = self.venues.write().await.get_mut(venue_id) {
            v.status = status;
        }
    }

    /// All venues eligible to route `symbol`, splitting primary candidates
    /// from designated fallback-only venues. `metrics` looks up each venue's
    /// live `VenueMetrics` (absent means "no observations yet", which does
    /// not disqualify a venue).
    pub async fn eligible_candidates(
        &self,
        symbol: Symbol,
        allow_dark_pool: bool,
        metrics: &crate::metrics::MetricsTracker,
        urgency: crate::Urgency,
    ) -> (Vec<VenueDescriptor>, Vec<VenueDescriptor>) {
        let guard = self.venues.read().await;
        let mut primary = Vec::new();
        let mut fallback = Vec::new();
        for v in guard.values() {
            let m = metrics.get(&v.venue_id);
            if !v.is_eligible(symbol, allow_dark_pool, &m, urgency) {
                continue;
            }
            if v.is_backup {
                fallback.push(v.clone());
            } else {
                primary.push(v.clone());
            }
        }
        (primary, fallback)
    }

    /// Snapshot of every registered venue, regardless of eligibility.
    pub async fn all(&self) -> Vec<VenueDescriptor> {
        self.venues.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsTracker;

    fn descriptor(id: &str, symbol: Symbol, is_backup: bool) -> VenueDescriptor {
        VenueDescriptor {
            venue_id: id.to_string(),
            maker_fee_bps: 1,
            taker_fee_bps: 2,
            symbols: vec![symbol],
            is_dark_pool: false,
            is_backup,
            status: VenueStatus::Connected,
            trading_enabled: true,
        }
    }

    #[tokio::test]
    async fn separates_primary_from_fallback_candidates() {
        let registry = VenueRegistry::new();
        let metrics = MetricsTracker::new(0.1);
        let sym = Symbol::new(1);
        registry.register(descriptor("a", sym, false)).await;
        registry.register(descriptor("b", sym, true)).await;

        let (primary, fallback) = registry
            .eligible_candidates(sym, false, &metrics, crate::Urgency::Medium)
            .await;
        assert_eq!(primary.len(), 1);
        assert_eq!(fallback.len(), 1);
    }

    #[tokio::test]
    async fn disconnected_venue_is_ineligible() {
        let registry = VenueRegistry::new();
        let metrics = MetricsTracker::new(0.1);
        let sym = Symbol::new(1);
        registry.register(descriptor("a", sym, false)).await;
        registry.set_status("a", VenueStatus::Disconnected).await;

        let (primary, _fallback) = registry
            .eligible_candidates(sym, false, &metrics, crate::Urgency::Medium)
            .await;
        assert!(primary.is_empty());
    }

    #[tokio::test]
    async fn trading_disabled_venue_is_ineligible() {
        let registry = VenueRegistry::new();
        let metrics = MetricsTracker::new(0.1);
        let sym = Symbol::new(1);
        let mut v = descriptor("a", sym, false);
        v.trading_enabled = false;
        registry.register(v).await;

        let (primary, _fallback) = registry
            .eligible_candidates(sym, false, &metrics, crate::Urgency::Medium)
            .await;
        assert!(primary.is_empty());
    }

    #[tokio::test]
    async fn dark_pool_excluded_unless_allowed() {
        let registry = VenueRegistry::new();
        let metrics = MetricsTracker::new(0.1);
        let sym = Symbol::new(1);
        let mut dark = descriptor("d", sym, false);
        dark.is_dark_pool = true;
        registry.register(dark).await;

        let (primary, _) = registry
            .eligible_candidates(sym, false, &metrics, crate::Urgency::Medium)
            .await;
        assert!(primary.is_empty());
        let (primary_allowed, _) = registry
            .eligible_candidates(sym, true, &metrics, crate::Urgency::Medium)
            .await;
        assert_eq!(primary_allowed.len(), 1);
    }

    #[tokio::test]
    async fn critical_urgency_excludes_high_latency_venues() {
        let registry = VenueRegistry::new();
        let metrics = MetricsTracker::new(0.1);
        let sym = Symbol::new(1);
        registry.register(descriptor("a", sym, false)).await;
        for _ in 0..5 {
            metrics.record(
                "a",
                crate::metrics::ExecutionOutcome {
                    filled: 1.0,
                    reachable: 1.0,
                    failed: 0.0,
                    latency_ms: 150.0,
                    cost_efficiency: 1.0,
                },
            );
        }

        let (primary, _) = registry
            .eligible_candidates(sym, false, &metrics, crate::Urgency::Critical)
            .await;
        assert!(primary.is_empty());
        let (primary_medium, _) = registry
            .eligible_candidates(sym, false, &metrics, crate::Urgency::Medium)
            .await;
        assert_eq!(primary_medium.len(), 1);
    }
}
