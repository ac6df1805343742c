//! Error taxonomy.
//!
//! Hot-path enums (checked on every depth update or trade print) get a
//! hand-written `Display` impl to avoid pulling `thiserror`'s derive machinery
//! into the tightest loops. Boundary errors (config, journal, subscription
//! setup) use `thiserror` since they're constructed rarely and benefit from
//! `#[from]` conversions.

use std::fmt;

use thiserror::Error;

use super::types::{RequestId, Symbol};

/// Why a depth or trade event was rejected before being applied to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEventError {
    /// `level` index fell outside the tracked depth window.
    LevelOutOfRange { level: usize, max: usize },
    /// Update carried a non-positive price or size on an `Insert`/`Update`.
    NonPositiveQuantity,
    /// `recv_ts_ms` moved backwards relative to the last applied event.
    NonMonotonicTimestamp { prev_ms: u64, got_ms: u64 },
    /// Applying the update would have crossed the book; reverted and skipped.
    CrossedBook,
}

impl fmt::Display for FeedEventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedEventError::LevelOutOfRange { level, max } => {
                write!(f, "level {} out of range (max {})", level, max)
            }
            FeedEventError::NonPositiveQuantity => {
                write!(f, "price or size was non-positive")
            }
            FeedEventError::NonMonotonicTimestamp { prev_ms, got_ms } => write!(
                f,
                "recv_ts went backwards: prev={} got={}",
                prev_ms, got_ms
            ),
            FeedEventError::CrossedBook => write!(f, "update rejected: would cross the book"),
        }
    }
}

impl std::error::Error for FeedEventError {}

/// Reasons `OrderBookState::is_book_valid` can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookIntegrityError {
    /// Best bid >= best ask.
    CrossedBook,
    /// Best bid == best ask.
    LockedBook,
    /// One side has no levels at all.
    EmptyBook,
    /// No depth update observed within the staleness window.
    StaleDepth { age_ms: u64, threshold_ms: u64 },
}

impl fmt::Display for BookIntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookIntegrityError::CrossedBook => write!(f, "book is crossed"),
            BookIntegrityError::LockedBook => write!(f, "book is locked"),
            BookIntegrityError::EmptyBook => write!(f, "book has an empty side"),
            BookIntegrityError::StaleDepth {
                age_ms,
                threshold_ms,
            } => write!(
                f,
                "depth is stale: age_ms={} threshold_ms={}",
                age_ms, threshold_ms
            ),
        }
    }
}

impl std::error::Error for BookIntegrityError {}

/// Classification of a broker-reported subscription error, used to decide
/// whether the symbol should be cooled down, dropped to tape-only, or
/// retried transparently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedErrorClass {
    /// Depth unsupported/unavailable for this symbol (broker code 10092).
    DepthIneligible,
    /// Tick-by-tick request budget exhausted (broker code 10190).
    TickByTickCapReached,
    /// Anything else the broker reports back; treated as retryable.
    TransientSubscription,
}

impl FeedErrorClass {
    /// Map a broker error code to a class. Unrecognized codes are treated
    /// as transient so a single unfamiliar code never wedges a symbol.
    pub fn from_broker_code(code: i32) -> Self {
        match code {
            10092 => FeedErrorClass::DepthIneligible,
            10190 => FeedErrorClass::TickByTickCapReached,
            _ => FeedErrorClass::TransientSubscription,
        }
    }
}

impl fmt::Display for FeedErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedErrorClass::DepthIneligible => write!(f, "depth ineligible"),
            FeedErrorClass::TickByTickCapReached => write!(f, "tick-by-tick cap reached"),
            FeedErrorClass::TransientSubscription => write!(f, "transient subscription error"),
        }
    }
}

impl std::error::Error for FeedErrorClass {}

/// Boundary errors raised while managing broker subscriptions.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("symbol {symbol} is not a member of the active universe")]
    UnknownSymbol { symbol: Symbol },

    #[error("request {request_id} is not outstanding")]
    UnknownRequest { request_id: RequestId },

    #[error("broker rejected request {request_id} for {symbol}: {class} (code {code})")]
    BrokerRejected {
        symbol: Symbol,
        request_id: RequestId,
        code: i32,
        class: FeedErrorClass,
    },

    #[error("symbol {symbol} is in depth cooldown for another {remaining_ms}ms")]
    InCooldown { symbol: Symbol, remaining_ms: u64 },
}

/// Boundary errors raised by the journal sink.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to open journal file at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize journal entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("journal writer thread panicked or disconnected")]
    WriterGone,
}

/// Boundary errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_code_mapping() {
        assert_eq!(
            FeedErrorClass::from_broker_code(10092),
            FeedErrorClass::DepthIneligible
        );
        assert_eq!(
            FeedErrorClass::from_broker_code(10190),
            FeedErrorClass::TickByTickCapReached
        );
        assert_eq!(
            FeedErrorClass::from_broker_code(1234),
            FeedErrorClass::TransientSubscription
        );
    }

    #[test]
    fn display_impls_do_not_panic() {
        let _ = FeedEventError::NonPositiveQuantity.to_string();
        let _ = BookIntegrityError::CrossedBook.to_string();
        let _ = FeedErrorClass::DepthIneligible.to_string();
    }
}
