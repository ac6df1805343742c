//! Entry/stop/target construction from the book at the decision instant
//! (§4.3 step 13).

use crate::core::types::Direction;

/// 4x/8x spread multipliers. The design notes flag these as promotable to
/// config if ever tuned (§9 open question b); fixed for now.
pub const STOP_SPREAD_MULTIPLIER: i64 = 4;
pub const TARGET_SPREAD_MULTIPLIER: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blueprint {
    pub direction: Direction,
    pub entry: i64,
    pub stop: i64,
    pub target: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueprintUnavailable {
    InvalidSpread,
    InvalidBid,
    InvalidAsk,
}

impl std::fmt::Display for BlueprintUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlueprintUnavailable::InvalidSpread => write!(f, "invalid spread"),
            BlueprintUnavailable::InvalidBid => write!(f, "invalid bid"),
            BlueprintUnavailable::InvalidAsk => write!(f, "invalid ask"),
        }
    }
}

impl std::error::Error for BlueprintUnavailable {}

/// Build the entry/stop/target triple for `direction` given the current
/// best bid/ask. Rejects non-positive inputs outright rather than letting
/// a zero spread silently produce a degenerate blueprint.
pub fn construct(
    direction: Direction,
    best_bid: i64,
    best_ask: i64,
) -> Result<Blueprint, BlueprintUnavailable> {
    if best_bid <= 0 {
        return Err(BlueprintUnavailable::InvalidBid);
    }
    if best_ask <= 0 {
        return Err(BlueprintUnavailable::InvalidAsk);
    }
    let spread = best_ask - best_bid;
    if spread <= 0 {
        return Err(BlueprintUnavailable::InvalidSpread);
    }

    let (entry, stop, target) = match direction {
        Direction::Buy => (
            best_ask,
            best_ask - STOP_SPREAD_MULTIPLIER * spread,
            best_ask + TARGET_SPREAD_MULTIPLIER * spread,
        ),
        Direction::Sell => (
            best_bid,
            best_bid + STOP_SPREAD_MULTIPLIER * spread,
            best_bid - TARGET_SPREAD_MULTIPLIER * spread,
        ),
    };

    if entry <= 0 || stop <= 0 || target <= 0 {
        return Err(BlueprintUnavailable::InvalidSpread);
    }

    Ok(Blueprint {
        direction,
        entry,
        stop,
        target,
    })
}
