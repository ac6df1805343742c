//! Post-signal quality monitor (§4.5): watches an accepted signal's book
//! for tape slowdown, tape reversal, or spread blowout and cancels it.

use dashmap::DashMap;

use crate::config::types::ShadowTradingConfig;
use crate::core::types::{DecisionId, Direction, Symbol};
use crate::metrics::MetricSnapshot;

const GRACE_PERIOD_MS: u64 = 3_000;
/// Tape slowdown must persist for two consecutive snapshots before firing.
const SLOWDOWN_CONFIRMATIONS_REQUIRED: u32 = 2;
/// Baseline side-velocity floor below which the slowdown check doesn't apply.
const SLOWDOWN_MIN_BASELINE_VELOCITY: f64 = 2.0;
const REVERSAL_MIN_OPPOSITE_VELOCITY: f64 = 5.0;
const REVERSAL_RATIO: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    TapeSlowdown,
    TapeReversal,
    SpreadBlowout,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CancelReason::TapeSlowdown => "TapeSlowdown",
            CancelReason::TapeReversal => "TapeReversal",
            CancelReason::SpreadBlowout => "SpreadBlowout",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    pub decision_id: DecisionId,
    pub symbol: Symbol,
    pub reason: CancelReason,
    pub current_spread: Option<i64>,
    pub baseline_spread: Option<i64>,
    pub current_side_velocity: f64,
    pub baseline_side_velocity: f64,
}

#[derive(Debug, Clone)]
struct AcceptedSignalTracker {
    decision_id: DecisionId,
    direction: Direction,
    baseline_spread: Option<i64>,
    baseline_side_velocity: f64,
    baseline_opposite_velocity: f64,
    accepted_ts: u64,
    consecutive_slowdowns: u32,
}

fn side_velocity(snapshot: &MetricSnapshot, direction: Direction) -> f64 {
    match direction {
        Direction::Buy => snapshot.bid_trades_in_3sec as f64,
        Direction::Sell => snapshot.ask_trades_in_3sec as f64,
    }
}

fn opposite_velocity(snapshot: &MetricSnapshot, direction: Direction) -> f64 {
    match direction {
        Direction::Buy => snapshot.ask_trades_in_3sec as f64,
        Direction::Sell => snapshot.bid_trades_in_3sec as f64,
    }
}

/// Tracks every currently-accepted signal and evaluates cancellation
/// conditions on each subsequent snapshot for that symbol.
pub struct PostSignalQualityMonitor {
    trackers: DashMap<Symbol, AcceptedSignalTracker>,
    config: ShadowTradingConfig,
}

impl PostSignalQualityMonitor {
    pub fn new(config: ShadowTradingConfig) -> Self {
        Self {
            trackers: DashMap::new(),
            config,
        }
    }

    pub fn track(&self, decision_id: DecisionId, symbol: Symbol, direction: Direction, snapshot: &MetricSnapshot, now_ms: u64) {
        self.trackers.insert(
            symbol,
            AcceptedSignalTracker {
                decision_id,
                direction,
                baseline_spread: snapshot.spread,
                baseline_side_velocity: side_velocity(snapshot, direction),
                baseline_opposite_velocity: opposite_velocity(snapshot, direction),
                accepted_ts: now_ms,
                consecutive_slowdowns: 0,
            },
        );
    }

    pub fn is_tracking(&self, symbol: &str) -> bool {
        self.trackers.contains_key(symbol)
    }

    /// Evaluate the active tracker for `symbol` (if any) against `snapshot`.
    /// Returns `Some(Cancellation)` and removes the tracker the instant a
    /// cancel condition fires.
    pub fn evaluate(&self, symbol: &str, snapshot: &MetricSnapshot, now_ms: u64) -> Option<Cancellation> {
        if !self.config.post_signal_monitoring_enabled {
            return None;
        }

        let mut entry = self.trackers.get_mut(symbol)?;
        if now_ms.saturating_sub(entry.accepted_ts) < GRACE_PERIOD_MS {
            return None;
        }

        let direction = entry.direction;
        let current_side_velocity = side_velocity(snapshot, direction);
        let current_opposite_velocity = opposite_velocity(snapshot, direction);

        if entry.baseline_side_velocity > SLOWDOWN_MIN_BASELINE_VELOCITY
            && current_side_velocity < entry.baseline_side_velocity * (1.0 - self.config.tape_slowdown_threshold)
        {
            entry.consecutive_slowdowns += 1;
        } else {
            entry.consecutive_slowdowns = 0;
        }

        let mut reason = None;
        if entry.consecutive_slowdowns >= SLOWDOWN_CONFIRMATIONS_REQUIRED {
            reason = Some(CancelReason::TapeSlowdown);
        } else if current_opposite_velocity > REVERSAL_MIN_OPPOSITE_VELOCITY
            && current_opposite_velocity > REVERSAL_RATIO * current_side_velocity
        {
            reason = Some(CancelReason::TapeReversal);
        } else if let (Some(current), Some(baseline)) = (snapshot.spread, entry.baseline_spread) {
            if (current as f64) > (baseline as f64) * (1.0 + self.config.spread_blowout_threshold) {
                reason = Some(CancelReason::SpreadBlowout);
            }
        }

        let reason = reason?;
        let cancellation = Cancellation {
            decision_id: entry.decision_id,
            symbol: symbol.to_string(),
            reason,
            current_spread: snapshot.spread,
            baseline_spread: entry.baseline_spread,
            current_side_velocity,
            baseline_side_velocity: entry.baseline_side_velocity,
        };
        drop(entry);
        self.trackers.remove(symbol);
        Some(cancellation)
    }
}
