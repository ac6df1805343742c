//! Wire-level event types and fundamental identifiers.
//!
//! These are the immutable messages the feed adapter hands to the core, and
//! the small set of identifiers threaded through every subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Equity ticker, interned as an owned string.
///
/// Symbols are short and the universe is small (tens, not millions), so a
/// plain `String` keeps the API simple; callers that need cheap clones can
/// wrap this in their own `Arc<str>` at the edges.
pub type Symbol = String;

/// Side of the book or of a trade classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// Depth book mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthOp {
    Insert,
    Update,
    Delete,
}

/// A single Level-II depth update, as normalized by the feed adapter.
///
/// `event_ts` is the exchange/broker-reported timestamp; `recv_ts` is the
/// monotonic wall-clock time this process observed the message. The core's
/// gating clock is always `recv_ts`; `event_ts`
/// is retained purely for the journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthUpdate {
    pub side: Side,
    pub op: DepthOp,
    pub level: usize,
    /// Fixed-point price, scaled by `PRICE_SCALE` (see `fixed_point`).
    pub price: i64,
    /// Fixed-point size, scaled by `PRICE_SCALE`.
    pub size: i64,
    pub event_ts_ms: u64,
    pub recv_ts_ms: u64,
}

/// A single time-and-sales print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePrint {
    pub price: i64,
    pub size: i64,
    pub event_ts_ms: u64,
    pub recv_ts_ms: u64,
}

/// Direction of a candidate shadow trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Opaque identifier for a broker subscription request (market data,
/// depth, or tick-by-tick line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Identifier for a staged/decided candidate, unique for the life of the
/// session. Carried through `PendingRankEntry`, `JournalEntry::decision_id`,
/// and `AcceptedSignalTracker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub uuid::Uuid);

impl DecisionId {
    pub fn new() -> Self {
        DecisionId(uuid::Uuid::new_v4())
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for the current broker session, stamped on every journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which outbound collaborators are active for the session (§6, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    /// Decisions are recorded, no outbound notifications.
    Shadow,
    /// Decisions are recorded and surfaced via notification channels.
    Preview,
    /// Like `Preview`, plus the raw feed is tee'd to durable storage.
    Record,
    /// Driving the pipeline from a captured JSONL sequence (replay validator).
    Replay,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradingMode::Shadow => "shadow",
            TradingMode::Preview => "preview",
            TradingMode::Record => "record",
            TradingMode::Replay => "replay",
        };
        write!(f, "{}", s)
    }
}

/// Fixed-point helpers. Prices and sizes travel as `i64` scaled by
/// `PRICE_SCALE` to keep `OrderBookState` allocation-free and to make
/// replay byte-identical (floating point would not guarantee that).
pub mod fixed_point {
    /// 4 decimal places is enough headroom for equities tick sizes.
    pub const PRICE_SCALE: i64 = 10_000;

    #[inline]
    pub fn from_f64(value: f64) -> i64 {
        (value * PRICE_SCALE as f64).round() as i64
    }

    #[inline]
    pub fn to_f64(value: i64) -> f64 {
        value as f64 / PRICE_SCALE as f64
    }
}
