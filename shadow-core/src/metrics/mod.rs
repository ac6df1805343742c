//! Derived per-symbol feature snapshots built from `OrderBookState`.

use dashmap::DashMap;

use crate::core::types::{Side, Symbol};
use crate::orderbook::trackers::DepthDeltaSnapshot;
use crate::orderbook::OrderBookState;

/// Depth levels folded into queue-imbalance and size totals.
pub const TOP_N_LEVELS: usize = 5;

/// Derived features for one symbol at one instant, keyed by monotonic ms.
///
/// `PartialEq` backs the replay validator's bit-identical-reproduction check
/// (§8 invariant 9): replaying the same captured event sequence twice must
/// produce snapshots that compare equal field-for-field.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub symbol: Symbol,
    pub timestamp_ms: u64,
    pub best_bid: Option<i64>,
    pub best_ask: Option<i64>,
    pub spread: Option<i64>,
    pub mid_price: Option<i64>,
    pub queue_imbalance: f64,
    pub bid_wall_age_ms: u64,
    pub ask_wall_age_ms: u64,
    pub bid_absorption_rate: f64,
    pub ask_absorption_rate: f64,
    pub tape_acceleration: f64,
    pub trades_in_3sec: usize,
    pub bid_trades_in_3sec: usize,
    pub ask_trades_in_3sec: usize,
    pub bid_delta_1s: DepthDeltaSnapshot,
    pub ask_delta_1s: DepthDeltaSnapshot,
    pub bid_delta_3s: DepthDeltaSnapshot,
    pub ask_delta_3s: DepthDeltaSnapshot,
    pub cumulative_vwap: f64,
    pub window_vwap: f64,
    pub window_volume: i64,
    pub last_trade_price: Option<i64>,
}

impl MetricSnapshot {
    /// VWAP-reclaim bonus condition for BUY/SELL (§4.3 step 14).
    pub fn vwap_reclaim_detected(&self, buy: bool) -> bool {
        let Some(last_price) = self.last_trade_price else {
            return false;
        };
        if self.window_volume < 1 {
            return false;
        }
        if buy {
            last_price as f64 > self.cumulative_vwap && (self.window_vwap as f64) < self.cumulative_vwap
        } else {
            (last_price as f64) < self.cumulative_vwap && self.window_vwap > self.cumulative_vwap
        }
    }
}

/// Aggregates trackers into `MetricSnapshot`s, enforcing the monotone
/// per-symbol timestamp invariant (§3, §8 invariant 3).
#[derive(Default)]
pub struct OrderFlowMetrics {
    last_processed_ms: DashMap<Symbol, u64>,
}

impl OrderFlowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot for `book` at `now_ms`. Returns `None` if `now_ms`
    /// does not strictly advance this symbol's clock, per the coordinator's
    /// skip-if-not-newer rule.
    pub fn produce_snapshot(&self, book: &OrderBookState, now_ms: u64) -> Option<MetricSnapshot> {
        if let Some(last) = self.last_processed_ms.get(&book.symbol) {
            if now_ms <= *last {
                return None;
            }
        }

        let mid = book.mid_price();
        let last_trade = book.recent_trades().back().copied();

        let snapshot = MetricSnapshot {
            symbol: book.symbol.clone(),
            timestamp_ms: now_ms,
            best_bid: book.best_bid(),
            best_ask: book.best_ask(),
            spread: book.spread(),
            mid_price: mid,
            queue_imbalance: book.queue_imbalance(TOP_N_LEVELS),
            bid_wall_age_ms: book.bid_wall_age_ms(now_ms),
            ask_wall_age_ms: book.ask_wall_age_ms(now_ms),
            bid_absorption_rate: book.bid_absorption_rate(now_ms),
            ask_absorption_rate: book.ask_absorption_rate(now_ms),
            tape_acceleration: book.tape.tape_acceleration(now_ms),
            trades_in_3sec: book.tape.trades_in(now_ms, 3_000),
            bid_trades_in_3sec: mid
                .map(|m| book.tape.trades_in_side(now_ms, 3_000, Side::Bid, m))
                .unwrap_or(0),
            ask_trades_in_3sec: mid
                .map(|m| book.tape.trades_in_side(now_ms, 3_000, Side::Ask, m))
                .unwrap_or(0),
            bid_delta_1s: book.depth_delta_snapshot(now_ms, Side::Bid, 1_000),
            ask_delta_1s: book.depth_delta_snapshot(now_ms, Side::Ask, 1_000),
            bid_delta_3s: book.depth_delta_snapshot(now_ms, Side::Bid, 3_000),
            ask_delta_3s: book.depth_delta_snapshot(now_ms, Side::Ask, 3_000),
            cumulative_vwap: book.vwap.cumulative_vwap(),
            window_vwap: book.vwap.window_vwap(),
            window_volume: book.vwap.window_volume(),
            last_trade_price: last_trade.map(|t| t.price),
        };

        self.last_processed_ms.insert(book.symbol.clone(), now_ms);
        Some(snapshot)
    }
}
