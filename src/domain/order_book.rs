// ============================================================================
// Order Book Domain Model
// ============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{decimal_to_micros, Order, OrderId, Side};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Book Ordering Key
// ============================================================================

/// Composite sort key: side-adjusted price, then priority score (higher
/// first), then submission sequence (earlier first) so small resting orders
/// are never starved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct BookKey {
    price: i64,
    priority: i64,
    sequence: u64,
}

impl BookKey {
    fn for_order(order: &Order, price: Decimal) -> Self {
        let price_micros = decimal_to_micros(price);
        Self {
            // Bids iterate highest-price-first, asks lowest-price-first
            price: match order.side {
                Side::Buy => -price_micros,
                Side::Sell => price_micros,
            },
            priority: -order.priority,
            sequence: order.sequence(),
        }
    }
}

// ============================================================================
// Book Statistics
// ============================================================================

/// Derived stats, recomputed synchronously on every book mutation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BookStats {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub bid_depth: usize,
    pub ask_depth: usize,
    pub last_update: DateTime<Utc>,
    /// Traded volume for the current UTC day.
    pub daily_volume: Decimal,
    pub daily_trades: u64,
    day: NaiveDate,
}

impl BookStats {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            best_bid: None,
            best_ask: None,
            spread: None,
            bid_depth: 0,
            ask_depth: 0,
            last_update: now,
            daily_volume: Decimal::ZERO,
            daily_trades: 0,
            day: now.date_naive(),
        }
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            self.day = today;
            self.daily_volume = Decimal::ZERO;
            self.daily_trades = 0;
        }
    }
}

// ============================================================================
// Order Book
// ============================================================================

/// Per-asset order book. Buy side sorted descending by price, sell side
/// ascending, ties broken by priority then submission time.
///
/// The book itself is not synchronized; the engine wraps each asset's book
/// in its own lock and serializes every mutation and match pass through it.
pub struct OrderBook {
    pub asset: String,
    bids: BTreeMap<BookKey, Arc<Order>>,
    asks: BTreeMap<BookKey, Arc<Order>>,
    /// OrderId -> placement key, for O(log n) removal.
    index: HashMap<OrderId, (Side, BookKey)>,
    stats: BookStats,
}

impl OrderBook {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            stats: BookStats::new(),
        }
    }

    /// Insert a priced order on its side. Unpriced (market) orders never
    /// rest in the book.
    pub fn insert(&mut self, order: Arc<Order>) {
        let Some(price) = order.limit_price else {
            tracing::warn!(order_id = %order.id, "refusing to rest unpriced order");
            return;
        };

        let key = BookKey::for_order(&order, price);
        self.index.insert(order.id, (order.side, key));
        match order.side {
            Side::Buy => self.bids.insert(key, order),
            Side::Sell => self.asks.insert(key, order),
        };
        self.recompute_stats();
    }

    pub fn remove(&mut self, order_id: &OrderId) -> Option<Arc<Order>> {
        let (side, key) = self.index.remove(order_id)?;
        let removed = match side {
            Side::Buy => self.bids.remove(&key),
            Side::Sell => self.asks.remove(&key),
        };
        self.recompute_stats();
        removed
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn best_bid(&self) -> Option<Decimal> {
        self.stats.best_bid
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.stats.best_ask
    }

    pub fn best_bid_ask(&self) -> (Option<Decimal>, Option<Decimal>) {
        (self.stats.best_bid, self.stats.best_ask)
    }

    pub fn stats(&self) -> &BookStats {
        &self.stats
    }

    /// Orders on one side in match priority order, filtered to live
    /// matchable statuses.
    pub fn candidates(&self, side: Side) -> Vec<Arc<Order>> {
        let map = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        map.values()
            .filter(|order| order.status().is_matchable())
            .cloned()
            .collect()
    }

    /// Every resting order on both sides, bids first.
    pub fn resting_orders(&self) -> Vec<Arc<Order>> {
        self.bids.values().chain(self.asks.values()).cloned().collect()
    }

    /// Aggregated depth: up to `levels` (price, visible quantity) pairs per
    /// side, iceberg display quantities honored.
    pub fn depth(&self, levels: usize) -> (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>) {
        (
            Self::aggregate_levels(self.bids.values(), levels),
            Self::aggregate_levels(self.asks.values(), levels),
        )
    }

    fn aggregate_levels<'a>(
        orders: impl Iterator<Item = &'a Arc<Order>>,
        levels: usize,
    ) -> Vec<(Decimal, Decimal)> {
        let mut out: Vec<(Decimal, Decimal)> = Vec::new();
        for order in orders {
            let Some(price) = order.limit_price else { continue };
            let visible = order.visible_quantity();
            if let Some(last) = out.last_mut() {
                if last.0 == price {
                    last.1 += visible;
                    continue;
                }
            }
            if out.len() == levels {
                break;
            }
            out.push((price, visible));
        }
        out
    }

    pub fn snapshot(&self, levels: usize) -> OrderBookSnapshot {
        let (bids, asks) = self.depth(levels);
        OrderBookSnapshot::with_depth(
            self.asset.clone(),
            bids,
            asks,
            self.stats.daily_volume,
            self.stats.daily_trades,
            self.stats.last_update,
        )
    }

    // ========================================================================
    // Mutation bookkeeping
    // ========================================================================

    /// Fold an executed trade into the rolling daily stats.
    pub fn record_trade(&mut self, amount: Decimal, _price: Decimal) {
        let now = Utc::now();
        self.stats.roll_day(now);
        self.stats.daily_volume += amount;
        self.stats.daily_trades += 1;
        self.stats.last_update = now;
    }

    fn recompute_stats(&mut self) {
        let now = Utc::now();
        self.stats.roll_day(now);
        self.stats.best_bid = self.bids.values().next().and_then(|o| o.limit_price);
        self.stats.best_ask = self.asks.values().next().and_then(|o| o.limit_price);
        self.stats.spread = match (self.stats.best_bid, self.stats.best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        };
        self.stats.bid_depth = self.bids.len();
        self.stats.ask_depth = self.asks.len();
        self.stats.last_update = now;
    }
}

// ============================================================================
// Order Book Snapshot
// ============================================================================

/// Immutable snapshot of the order book state
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderBookSnapshot {
    pub asset: String,
    /// Bid levels (price, visible quantity)
    pub bids: Vec<(Decimal, Decimal)>,
    /// Ask levels (price, visible quantity)
    pub asks: Vec<(Decimal, Decimal)>,
    /// Current spread (ask - bid)
    pub spread: Option<Decimal>,
    /// Mid price
    pub mid_price: Option<Decimal>,
    pub daily_volume: Decimal,
    pub daily_trades: u64,
    pub last_update: DateTime<Utc>,
}

impl OrderBookSnapshot {
    pub fn with_depth(
        asset: String,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
        daily_volume: Decimal,
        daily_trades: u64,
        last_update: DateTime<Utc>,
    ) -> Self {
        let spread = match (bids.first(), asks.first()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        };

        let mid_price = match (bids.first(), asks.first()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        };

        Self {
            asset,
            bids,
            asks,
            spread,
            mid_price,
            daily_volume,
            daily_trades,
            last_update,
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|(price, _)| *price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|(price, _)| *price)
    }

    pub fn total_bid_quantity(&self) -> Decimal {
        self.bids.iter().map(|(_, qty)| qty).sum()
    }

    pub fn total_ask_quantity(&self) -> Decimal {
        self.asks.iter().map(|(_, qty)| qty).sum()
    }
}
