//! Per-symbol order-book state and the feature trackers that ride beside it.

pub mod levels;
pub mod trackers;

use std::collections::VecDeque;

use tracing::warn;

use crate::core::errors::{BookIntegrityError, FeedEventError};
use crate::core::types::{DepthOp, DepthUpdate, Side, Symbol, TradePrint};

use levels::Level;
use trackers::{BidWallTracker, DepthDeltaSnapshot, DepthDeltaTracker, TapeVelocityTracker, VwapTracker};

/// Depth becomes stale (and the book invalid) if no update has landed
/// within this many milliseconds (§4.1).
pub const STALE_DEPTH_THRESHOLD_MS: u64 = 2_000;

/// Upper bound on the retained trade-print ring (§3).
pub const MAX_RECENT_TRADES: usize = 4_096;

/// Monotonically non-decreasing, per-symbol counters of skipped or
/// malformed events, broken out by the flag that caused the skip.
#[derive(Debug, Clone, Default)]
pub struct DataQualityCounters {
    pub non_positive_quantity: u64,
    pub non_monotonic_timestamp: u64,
    pub crossed_book_rejections: u64,
    pub level_out_of_range: u64,
}

impl DataQualityCounters {
    pub fn total(&self) -> u64 {
        self.non_positive_quantity
            + self.non_monotonic_timestamp
            + self.crossed_book_rejections
            + self.level_out_of_range
    }
}

/// Why `is_book_valid` considers the book unusable right now.
pub type ValidityError = BookIntegrityError;

/// Exact depth book plus bounded tape ring for one symbol, and the feature
/// trackers that derive rolling statistics from the same event stream.
///
/// Owned exclusively by the feed-ingest partition for this symbol; every
/// other component reads through a registry that hands out snapshots.
pub struct OrderBookState {
    pub symbol: Symbol,
    bid_levels: Vec<Level>,
    ask_levels: Vec<Level>,
    trades: VecDeque<TradePrint>,
    last_depth_update_ms: u64,
    bid_wall: BidWallTracker,
    ask_wall: BidWallTracker,
    pub tape: TapeVelocityTracker,
    pub depth_delta: DepthDeltaTracker,
    pub vwap: VwapTracker,
    pub quality: DataQualityCounters,
}

impl OrderBookState {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bid_levels: Vec::new(),
            ask_levels: Vec::new(),
            trades: VecDeque::with_capacity(MAX_RECENT_TRADES),
            last_depth_update_ms: 0,
            bid_wall: BidWallTracker::new(Side::Bid),
            ask_wall: BidWallTracker::new(Side::Ask),
            tape: TapeVelocityTracker::new(),
            depth_delta: DepthDeltaTracker::new(),
            vwap: VwapTracker::new(),
            quality: DataQualityCounters::default(),
        }
    }

    /// Apply one depth mutation. Malformed or cross-inducing updates are
    /// skipped and flagged rather than propagated as a hard error; the
    /// returned `Err` is for the caller's logging/metrics, not a signal to
    /// abort the stream.
    pub fn apply_depth(&mut self, u: DepthUpdate) -> Result<(), FeedEventError> {
        if u.op != DepthOp::Delete && (u.price <= 0 || u.size < 0) {
            self.quality.non_positive_quantity += 1;
            return Err(FeedEventError::NonPositiveQuantity);
        }
        if u.recv_ts_ms < self.last_depth_update_ms {
            self.quality.non_monotonic_timestamp += 1;
            return Err(FeedEventError::NonMonotonicTimestamp {
                prev_ms: self.last_depth_update_ms,
                got_ms: u.recv_ts_ms,
            });
        }

        let side_levels = match u.side {
            Side::Bid => &mut self.bid_levels,
            Side::Ask => &mut self.ask_levels,
        };
        let max_len = side_levels.len();
        let prev_size = side_levels.get(u.level).map(|&(_, s)| s);
        let before = side_levels.clone();
        let applied = levels::apply(side_levels, u.side, u.op, u.level, u.price, u.size);
        if !applied {
            self.quality.level_out_of_range += 1;
            return Err(FeedEventError::LevelOutOfRange {
                level: u.level,
                max: max_len,
            });
        }

        if levels::would_cross(&self.bid_levels, &self.ask_levels) {
            // Restore the side we just mutated and bail; a single bad
            // event never corrupts the book.
            match u.side {
                Side::Bid => self.bid_levels = before,
                Side::Ask => self.ask_levels = before,
            }
            self.quality.crossed_book_rejections += 1;
            warn!(symbol = %self.symbol, side = %u.side, "depth update rejected: would cross book");
            return Err(FeedEventError::CrossedBook);
        }

        self.last_depth_update_ms = u.recv_ts_ms;
        match u.op {
            DepthOp::Insert => self.depth_delta.record_insert(u.recv_ts_ms, u.side, u.size),
            DepthOp::Update => {
                self.depth_delta
                    .record_update(u.recv_ts_ms, u.side, prev_size.unwrap_or(0), u.size)
            }
            DepthOp::Delete => {
                self.depth_delta
                    .record_delete(u.recv_ts_ms, u.side, prev_size.unwrap_or(0))
            }
        }
        self.bid_wall.observe(&self.bid_levels, u.recv_ts_ms);
        self.ask_wall.observe(&self.ask_levels, u.recv_ts_ms);
        Ok(())
    }

    /// Record a time-and-sales print: push into the bounded ring, update
    /// VWAP/velocity trackers, and credit absorption if the print touches
    /// the relevant side's best price.
    pub fn record_trade(&mut self, t: TradePrint) {
        if self.trades.len() >= MAX_RECENT_TRADES {
            self.trades.pop_front();
        }
        self.trades.push_back(t);
        self.tape.record(t.recv_ts_ms, t.price, t.size);
        self.vwap.record(t.recv_ts_ms, t.price, t.size);

        if self.best_bid() == Some(t.price) {
            self.bid_wall.record_absorption(t.size);
        }
        if self.best_ask() == Some(t.price) {
            self.ask_wall.record_absorption(t.size);
        }
    }

    pub fn is_book_valid(&self, now_ms: u64) -> Result<(), BookIntegrityError> {
        let bid = self.best_bid();
        let ask = self.best_ask();
        match (bid, ask) {
            (None, _) | (_, None) => Err(BookIntegrityError::EmptyBook),
            (Some(b), Some(a)) if b > a => Err(BookIntegrityError::CrossedBook),
            (Some(b), Some(a)) if b == a => Err(BookIntegrityError::LockedBook),
            _ => {
                let age = now_ms.saturating_sub(self.last_depth_update_ms);
                if age > STALE_DEPTH_THRESHOLD_MS {
                    Err(BookIntegrityError::StaleDepth {
                        age_ms: age,
                        threshold_ms: STALE_DEPTH_THRESHOLD_MS,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn best_bid(&self) -> Option<i64> {
        self.bid_levels.first().map(|&(p, _)| p)
    }

    pub fn best_ask(&self) -> Option<i64> {
        self.ask_levels.first().map(|&(p, _)| p)
    }

    pub fn best_bid_size(&self) -> Option<i64> {
        self.bid_levels.first().map(|&(_, s)| s)
    }

    pub fn best_ask_size(&self) -> Option<i64> {
        self.ask_levels.first().map(|&(_, s)| s)
    }

    pub fn spread(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(b / 2 + a / 2 + (b % 2 + a % 2) / 2),
            _ => None,
        }
    }

    pub fn total_bid_size(&self, top_n: usize) -> i64 {
        self.bid_levels.iter().take(top_n).map(|&(_, s)| s).sum()
    }

    pub fn total_ask_size(&self, top_n: usize) -> i64 {
        self.ask_levels.iter().take(top_n).map(|&(_, s)| s).sum()
    }

    /// `top_n_bid_size / (top_n_bid_size + top_n_ask_size)`, or `0.5` when
    /// both sides are empty (a neutral reading rather than a division by
    /// zero).
    pub fn queue_imbalance(&self, top_n: usize) -> f64 {
        let bid = self.total_bid_size(top_n) as f64;
        let ask = self.total_ask_size(top_n) as f64;
        if bid + ask <= 0.0 {
            0.5
        } else {
            bid / (bid + ask)
        }
    }

    pub fn bid_wall_age_ms(&self, now_ms: u64) -> u64 {
        self.bid_wall.age_ms(now_ms)
    }

    pub fn ask_wall_age_ms(&self, now_ms: u64) -> u64 {
        self.ask_wall.age_ms(now_ms)
    }

    pub fn bid_absorption_rate(&self, now_ms: u64) -> f64 {
        self.bid_wall.absorption_rate(now_ms)
    }

    pub fn ask_absorption_rate(&self, now_ms: u64) -> f64 {
        self.ask_wall.absorption_rate(now_ms)
    }

    pub fn depth_delta_snapshot(&self, now_ms: u64, side: Side, window_ms: u64) -> DepthDeltaSnapshot {
        self.depth_delta.snapshot(now_ms, side, window_ms)
    }

    pub fn last_depth_update_ms(&self) -> u64 {
        self.last_depth_update_ms
    }

    pub fn bid_levels(&self) -> &[Level] {
        &self.bid_levels
    }

    pub fn ask_levels(&self) -> &[Level] {
        &self.ask_levels
    }

    pub fn recent_trades(&self) -> &VecDeque<TradePrint> {
        &self.trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::fixed_point::from_f64;

    fn depth(side: Side, op: DepthOp, level: usize, price: f64, size: f64, ts: u64) -> DepthUpdate {
        DepthUpdate {
            side,
            op,
            level,
            price: from_f64(price),
            size: from_f64(size),
            event_ts_ms: ts,
            recv_ts_ms: ts,
        }
    }

    #[test]
    fn empty_book_is_invalid() {
        let book = OrderBookState::new("AAPL".to_string());
        assert_eq!(book.is_book_valid(0), Err(BookIntegrityError::EmptyBook));
    }

    #[test]
    fn valid_book_after_both_sides_populated() {
        let mut book = OrderBookState::new("AAPL".to_string());
        book.apply_depth(depth(Side::Bid, DepthOp::Insert, 0, 262.00, 50.0, 1000)).unwrap();
        book.apply_depth(depth(Side::Ask, DepthOp::Insert, 0, 262.02, 50.0, 1000)).unwrap();
        assert!(book.is_book_valid(1000).is_ok());
        assert_eq!(book.best_bid(), Some(from_f64(262.00)));
        assert_eq!(book.best_ask(), Some(from_f64(262.02)));
    }

    #[test]
    fn crossing_update_is_rejected_and_flagged() {
        let mut book = OrderBookState::new("AAPL".to_string());
        book.apply_depth(depth(Side::Bid, DepthOp::Insert, 0, 100.0, 10.0, 1000)).unwrap();
        book.apply_depth(depth(Side::Ask, DepthOp::Insert, 0, 101.0, 10.0, 1000)).unwrap();
        let result = book.apply_depth(depth(Side::Bid, DepthOp::Insert, 0, 105.0, 10.0, 1001));
        assert!(result.is_err());
        assert_eq!(book.quality.crossed_book_rejections, 1);
        assert_eq!(book.best_bid(), Some(from_f64(100.0)), "rejected update must not mutate the book");
    }

    #[test]
    fn stale_depth_detected_after_threshold() {
        let mut book = OrderBookState::new("AAPL".to_string());
        book.apply_depth(depth(Side::Bid, DepthOp::Insert, 0, 100.0, 10.0, 1000)).unwrap();
        book.apply_depth(depth(Side::Ask, DepthOp::Insert, 0, 101.0, 10.0, 1000)).unwrap();
        assert!(book.is_book_valid(1000 + STALE_DEPTH_THRESHOLD_MS + 1).is_err());
    }

    #[test]
    fn idempotent_update_leaves_book_unchanged() {
        let mut book = OrderBookState::new("AAPL".to_string());
        book.apply_depth(depth(Side::Bid, DepthOp::Insert, 0, 100.0, 10.0, 1000)).unwrap();
        let before = book.bid_levels().to_vec();
        book.apply_depth(depth(Side::Bid, DepthOp::Update, 0, 100.0, 10.0, 1001)).unwrap();
        assert_eq!(book.bid_levels().to_vec(), before);
    }

    #[test]
    fn non_monotonic_timestamp_is_skipped() {
        let mut book = OrderBookState::new("AAPL".to_string());
        book.apply_depth(depth(Side::Bid, DepthOp::Insert, 0, 100.0, 10.0, 2000)).unwrap();
        let result = book.apply_depth(depth(Side::Bid, DepthOp::Insert, 0, 99.0, 10.0, 1000));
        assert!(result.is_err());
        assert_eq!(book.quality.non_monotonic_timestamp, 1);
    }

    #[test]
    fn bounded_trade_ring_evicts_oldest() {
        let mut book = OrderBookState::new("AAPL".to_string());
        for i in 0..(MAX_RECENT_TRADES + 10) {
            book.record_trade(TradePrint {
                price: from_f64(100.0),
                size: from_f64(1.0),
                event_ts_ms: i as u64,
                recv_ts_ms: i as u64,
            });
        }
        assert_eq!(book.recent_trades().len(), MAX_RECENT_TRADES);
    }
}
