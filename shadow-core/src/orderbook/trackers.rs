//! Rolling feature trackers that sit beside `OrderBookState`.
//!
//! Each tracker owns one narrow slice of derived state and is fed directly
//! by `OrderBookState::apply_depth` / `record_trade`, so none of them touch
//! the level vectors themselves.

use std::collections::VecDeque;

use crate::core::types::Side;

use super::levels::Level;

/// Tracks how long the largest resting level on a side has held its price,
/// and how much of it has been eaten by trades at that price (absorption).
#[derive(Debug, Clone)]
pub struct BidWallTracker {
    side: Side,
    top_price: i64,
    top_size: i64,
    since_ms: u64,
    absorbed_size: i64,
    absorbed_window_start_ms: u64,
}

impl BidWallTracker {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            top_price: 0,
            top_size: 0,
            since_ms: 0,
            absorbed_size: 0,
            absorbed_window_start_ms: 0,
        }
    }

    /// Re-scan the side's levels for the current largest one; resets the
    /// age clock whenever the largest level's *price* changes.
    pub fn observe(&mut self, levels: &[Level], now_ms: u64) {
        let top = levels.iter().max_by_key(|(_, size)| *size).copied();
        match top {
            Some((price, size)) => {
                if price != self.top_price {
                    self.since_ms = now_ms;
                    self.absorbed_size = 0;
                    self.absorbed_window_start_ms = now_ms;
                }
                self.top_price = price;
                self.top_size = size;
            }
            None => {
                self.top_price = 0;
                self.top_size = 0;
                self.since_ms = now_ms;
            }
        }
    }

    /// Call once per trade print that lands on this side's best price.
    pub fn record_absorption(&mut self, traded_size: i64) {
        self.absorbed_size += traded_size;
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.since_ms)
    }

    /// Traded size consumed at the wall's price per second since the wall
    /// appeared at its current price.
    pub fn absorption_rate(&self, now_ms: u64) -> f64 {
        let elapsed_s = (now_ms.saturating_sub(self.absorbed_window_start_ms)) as f64 / 1000.0;
        if elapsed_s <= 0.0 {
            0.0
        } else {
            self.absorbed_size as f64 / elapsed_s
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

/// Rolling prints-per-second over 3s and 15s windows, plus a robust
/// z-score of the short window against the long one.
#[derive(Debug, Clone)]
pub struct TapeVelocityTracker {
    /// (recv_ts_ms, price, size) of recent prints, newest at the back.
    prints: VecDeque<(u64, i64, i64)>,
    retain_window_ms: u64,
}

impl TapeVelocityTracker {
    pub fn new() -> Self {
        Self {
            prints: VecDeque::new(),
            retain_window_ms: 15_000,
        }
    }

    pub fn record(&mut self, recv_ts_ms: u64, price: i64, size: i64) {
        self.prints.push_back((recv_ts_ms, price, size));
        self.evict(recv_ts_ms);
    }

    fn evict(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.retain_window_ms);
        while let Some(&(ts, _, _)) = self.prints.front() {
            if ts < cutoff {
                self.prints.pop_front();
            } else {
                break;
            }
        }
    }

    fn window(&self, now_ms: u64, window_ms: u64) -> Vec<(u64, i64, i64)> {
        let cutoff = now_ms.saturating_sub(window_ms);
        self.prints
            .iter()
            .filter(|&&(ts, _, _)| ts >= cutoff)
            .copied()
            .collect()
    }

    pub fn trades_in(&self, now_ms: u64, window_ms: u64) -> usize {
        self.window(now_ms, window_ms).len()
    }

    /// Count of trades in the window whose price sits on the given side of
    /// `mid` (bid = at/below mid, ask = at/above mid).
    pub fn trades_in_side(&self, now_ms: u64, window_ms: u64, side: Side, mid: i64) -> usize {
        self.window(now_ms, window_ms)
            .into_iter()
            .filter(|&(_, price, _)| match side {
                Side::Bid => price <= mid,
                Side::Ask => price >= mid,
            })
            .count()
    }

    pub fn volume_in(&self, now_ms: u64, window_ms: u64) -> i64 {
        self.window(now_ms, window_ms).iter().map(|&(_, _, s)| s).sum()
    }

    fn prints_per_second(&self, now_ms: u64, window_ms: u64) -> f64 {
        let count = self.trades_in(now_ms, window_ms) as f64;
        count / (window_ms as f64 / 1000.0)
    }

    /// Robust z-score of the 3s prints-per-second rate against the rolling
    /// median of per-second buckets over the last 15s. Returns 0 if there
    /// is not yet enough history to form a baseline.
    pub fn tape_acceleration(&self, now_ms: u64) -> f64 {
        let short_rate = self.prints_per_second(now_ms, 3_000);
        let mut bucket_counts: Vec<f64> = Vec::with_capacity(15);
        for bucket in 0..15u64 {
            let bucket_end = now_ms.saturating_sub(bucket * 1000);
            let bucket_start = bucket_end.saturating_sub(1000);
            let count = self
                .prints
                .iter()
                .filter(|&&(ts, _, _)| ts >= bucket_start && ts < bucket_end)
                .count() as f64;
            bucket_counts.push(count);
        }
        if bucket_counts.is_empty() {
            return 0.0;
        }
        let median = median(&mut bucket_counts.clone());
        let mad = median_absolute_deviation(&bucket_counts, median);
        if mad < 1e-9 {
            return 0.0;
        }
        (short_rate - median) / (1.4826 * mad)
    }
}

impl Default for TapeVelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn median_absolute_deviation(values: &[f64], median_value: f64) -> f64 {
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - median_value).abs()).collect();
    median(&mut deviations)
}

/// Per-level-op counters over 1s and 3s windows, separated by side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthDeltaSnapshot {
    pub insert_count: u32,
    pub update_count: u32,
    pub delete_count: u32,
    pub added_size: i64,
    pub canceled_size: i64,
}

impl DepthDeltaSnapshot {
    pub fn cancel_to_add_ratio(&self) -> f64 {
        let eps = 1e-9;
        self.canceled_size as f64 / (self.added_size as f64).max(eps)
    }
}

#[derive(Debug, Clone, Copy)]
enum DeltaKind {
    Insert,
    Update,
    Delete,
}

/// Tracks depth mutation volume (inserts/updates/deletes and their sizes)
/// in 1s and 3s rolling windows, per side.
#[derive(Debug, Clone, Default)]
pub struct DepthDeltaTracker {
    events: VecDeque<(u64, Side, DeltaKind, i64, i64)>,
}

impl DepthDeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&mut self, now_ms: u64, side: Side, size: i64) {
        self.push(now_ms, side, DeltaKind::Insert, size, 0);
    }

    pub fn record_update(&mut self, now_ms: u64, side: Side, prev_size: i64, new_size: i64) {
        let (added, canceled) = if new_size >= prev_size {
            (new_size - prev_size, 0)
        } else {
            (0, prev_size - new_size)
        };
        self.push(now_ms, side, DeltaKind::Update, added, canceled);
    }

    pub fn record_delete(&mut self, now_ms: u64, side: Side, removed_size: i64) {
        self.push(now_ms, side, DeltaKind::Delete, 0, removed_size);
    }

    fn push(&mut self, now_ms: u64, side: Side, kind: DeltaKind, added: i64, canceled: i64) {
        self.events.push_back((now_ms, side, kind, added, canceled));
        let cutoff = now_ms.saturating_sub(3_000);
        while let Some(&(ts, ..)) = self.events.front() {
            if ts < cutoff {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn snapshot(&self, now_ms: u64, side: Side, window_ms: u64) -> DepthDeltaSnapshot {
        let cutoff = now_ms.saturating_sub(window_ms);
        let mut snap = DepthDeltaSnapshot::default();
        for &(ts, ev_side, kind, added, canceled) in self.events.iter() {
            if ts < cutoff || ev_side != side {
                continue;
            }
            match kind {
                DeltaKind::Insert => snap.insert_count += 1,
                DeltaKind::Update => snap.update_count += 1,
                DeltaKind::Delete => snap.delete_count += 1,
            }
            snap.added_size += added;
            snap.canceled_size += canceled;
        }
        snap
    }

    /// Rolled-up 1s counters for a side used by the anti-spoof filter.
    pub fn one_second(&self, now_ms: u64, side: Side) -> DepthDeltaSnapshot {
        self.snapshot(now_ms, side, 1_000)
    }

    /// Rolled-up 3s counters for a side.
    pub fn three_second(&self, now_ms: u64, side: Side) -> DepthDeltaSnapshot {
        self.snapshot(now_ms, side, 3_000)
    }

    /// Cancel count within 1s, used directly by the anti-spoof threshold.
    pub fn cancel_count_one_second(&self, now_ms: u64, side: Side) -> u32 {
        self.one_second(now_ms, side).delete_count
    }

    pub fn add_count_one_second(&self, now_ms: u64, side: Side) -> u32 {
        self.one_second(now_ms, side).insert_count
    }
}

/// Cumulative session VWAP plus a trailing 3s-window VWAP.
#[derive(Debug, Clone, Default)]
pub struct VwapTracker {
    cumulative_notional: f64,
    cumulative_volume: i64,
    window: VecDeque<(u64, i64, i64)>,
}

impl VwapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, now_ms: u64, price: i64, size: i64) {
        self.cumulative_notional += price as f64 * size as f64;
        self.cumulative_volume += size;
        self.window.push_back((now_ms, price, size));
        let cutoff = now_ms.saturating_sub(3_000);
        while let Some(&(ts, _, _)) = self.window.front() {
            if ts < cutoff {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn cumulative_vwap(&self) -> f64 {
        if self.cumulative_volume == 0 {
            0.0
        } else {
            self.cumulative_notional / self.cumulative_volume as f64
        }
    }

    pub fn window_vwap(&self) -> f64 {
        let (notional, volume) = self
            .window
            .iter()
            .fold((0.0f64, 0i64), |(n, v), &(_, p, s)| (n + p as f64 * s as f64, v + s));
        if volume == 0 {
            0.0
        } else {
            notional / volume as f64
        }
    }

    pub fn window_volume(&self) -> i64 {
        self.window.iter().map(|&(_, _, s)| s).sum()
    }
}
