//! Liquidity snapshots aggregated across venues

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use services_common::{Px, Qty, Side, Symbol};

/// A single price level reported by a venue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AggregatedLevel {
    /// Price of this level.
    pub price: Px,
    /// Visible quantity at this level.
    pub qty: Qty,
}

/// The cost of filling a quantity by walking a venue's book: the
/// volume-weighted average price and how much of the request the book
/// could actually satisfy.
#[derive(Debug, Clone, Copy)]
pub struct WalkResult {
    /// Quantity the book could fill, at most the quantity requested.
    pub filled_qty: Qty,
    /// Volume-weighted average price paid across the levels walked.
    pub avg_price: Px,
    /// Worst (last-touched) price, used for slippage-cap checks.
    pub worst_price: Px,
}

/// A venue's current order book plus rolling volume, as seen by the router.
///
/// Levels are sorted best-first: `bids` descending by price, `asks`
/// ascending by price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquiditySnapshot {
    /// Venue identifier.
    pub venue_id: String,
    /// Symbol this snapshot describes.
    pub symbol: Symbol,
    /// Bid levels, best (highest price) first.
    pub bids: Vec<AggregatedLevel>,
    /// Ask levels, best (lowest price) first.
    pub asks: Vec<AggregatedLevel>,
    /// Trailing 24h volume (fixed-point units), used for proportional splitting.
    pub volume_24h: Qty,
}

impl LiquiditySnapshot {
    /// Levels on the side an order trades against: selling hits bids,
    /// buying lifts asks.
    fn opposing_levels(&self, side: Side) -> &[AggregatedLevel] {
        match side {
            Side::Bid => &self.asks,
            Side::Ask => &self.bids,
        }
    }

    /// Best opposing price, if the book has any depth on that side.
    #[must_use]
    pub fn execution_price(&self, side: Side) -> Option<Px> {
        self.opposing_levels(side).first().map(|l| l.price)
    }

    /// Total visible quantity on the side the order needs to trade against.
    #[must_use]
    pub fn available_qty(&self, side: Side) -> Qty {
        self.opposing_levels(side)
            .iter()
            .fold(Qty::ZERO, |acc, l| acc.add(l.qty))
    }

    /// Walks the opposing book consuming up to `qty`, optionally bounded by
    /// `limit_price` (an order never trades through its own limit).
    /// Returns `None` if the book has zero depth on that side.
    #[must_use]
    pub fn walk(&self, side: Side, qty: Qty, limit_price: Option<Px>) -> Option<WalkResult> {
        let levels = self.opposing_levels(side);
        if levels.is_empty() || qty.is_zero() {
            return None;
        }
        let mut remaining = qty.as_i64();
        let mut notional: i64 = 0;
        let mut filled: i64 = 0;
        let mut worst = levels[0].price;
        for level in levels {
            if remaining <= 0 {
                break;
            }
            if let Some(limit) = limit_price {
                let crosses = match side {
                    Side::Bid => level.price > limit,
                    Side::Ask => level.price < limit,
                };
                if crosses {
                    break;
                }
            }
            let take = remaining.min(level.qty.as_i64());
            if take <= 0 {
                continue;
            }
            notional += take * level.price.as_i64();
            filled += take;
            worst = level.price;
            remaining -= take;
        }
        if filled == 0 {
            return None;
        }
        let avg_price = Px::from_i64(notional / filled);
        Some(WalkResult {
            filled_qty: Qty::from_i64(filled),
            avg_price,
            worst_price: worst,
        })
    }
}

/// Aggregates snapshots from every registered `LiquiditySource` into a
/// per-venue view the router can score candidates against.
#[derive(Debug, Default)]
pub struct LiquidityView {
    snapshots: FxHashMap<String, LiquiditySnapshot>,
}

impl LiquidityView {
    /// Create an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace (or insert) the snapshot reported for a venue.
    pub fn update(&mut self, snapshot: LiquiditySnapshot) {
        self.snapshots.insert(snapshot.venue_id.clone(), snapshot);
    }

    /// Snapshot for a single venue, if known.
    #[must_use]
    pub fn venue(&self, venue_id: &str) -> Option<&LiquiditySnapshot> {
        self.snapshots.get(venue_id)
    }

    /// All known snapshots for `symbol`.
    #[must_use]
    pub fn for_symbol(&self, symbol: Symbol) -> Vec<&LiquiditySnapshot> {
        self.snapshots
            .values()
            .filter(|s| s.symbol == symbol)
            .collect()
    }

    /// Total visible depth across all venues for the given side.
    #[must_use]
    pub fn total_depth(&self, symbol: Symbol, side: Side) -> Qty {
        self.for_symbol(symbol)
            .iter()
            .fold(Qty::ZERO, |acc, s| acc.add(s.available_qty(side)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64, qty: f64) -> AggregatedLevel {
        AggregatedLevel {
            price: Px::new(price),
            qty: Qty::new(qty),
        }
    }

    fn snapshot() -> LiquiditySnapshot {
        LiquiditySnapshot {
            venue_id: "a".into(),
            symbol: Symbol::new(1),
            bids: vec![level(49_990.0, 10.0), level(49_980.0, 10.0)],
            asks: vec![level(50_000.0, 6.0), level(50_001.0, 4.0)],
            volume_24h: Qty::new(1_000.0),
        }
    }

    #[test]
    fn walk_consumes_multiple_levels_and_averages_price() {
        let snap = snapshot();
        let walk = snap.walk(Side::Bid, Qty::new(10.0), None).unwrap();
        assert_eq!(walk.filled_qty, Qty::new(10.0));
        assert!((walk.avg_price.as_f64() - 50_000.4).abs() < 0.01);
        assert_eq!(walk.worst_price, Px::new(50_001.0));
    }

    #[test]
    fn walk_stops_at_limit_price() {
        let snap = snapshot();
        let walk = snap
            .walk(Side::Bid, Qty::new(10.0), Some(Px::new(50_000.0)))
            .unwrap();
        assert_eq!(walk.filled_qty, Qty::new(6.0));
    }

    #[test]
    fn walk_returns_none_on_empty_book() {
        let mut snap = snapshot();
        snap.asks.clear();
        assert!(snap.walk(Side::Bid, Qty::new(1.0), None).is_none());
    }
}
