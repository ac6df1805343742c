//! Sorted level-vector mutation helpers shared by both book sides.
//!
//! Bids are kept strictly decreasing by price; asks strictly increasing.
//! `Insert` shifts everything at or below (bid) / at or above (ask) the
//! target level down to make room; `Delete` shifts the remainder up.

use crate::core::types::{DepthOp, Side};

/// One level: `(price, size)`, both already in fixed-point scale.
pub type Level = (i64, i64);

/// Apply a single depth op to a side's level vector in place.
///
/// `level` is clamped to `vec.len()` on `Insert` (append past the end is a
/// no-op insert-at-end, never a panic). Returns `false` if `level` was out
/// of range for `Update`/`Delete` (nothing to touch).
pub fn apply(levels: &mut Vec<Level>, side: Side, op: DepthOp, level: usize, price: i64, size: i64) -> bool {
    match op {
        DepthOp::Insert => {
            let at = level.min(levels.len());
            levels.insert(at, (price, size));
            resort(levels, side);
            true
        }
        DepthOp::Update => {
            if let Some(slot) = levels.get_mut(level) {
                *slot = (price, size);
                true
            } else {
                false
            }
        }
        DepthOp::Delete => {
            if level < levels.len() {
                levels.remove(level);
                true
            } else {
                false
            }
        }
    }
}

/// Re-establish sort order after an insert. Inserts normally land at the
/// right spot already (feeds send level-ordered updates), but a single
/// resort keeps the invariant airtight against out-of-order inserts.
fn resort(levels: &mut [Level], side: Side) {
    match side {
        Side::Bid => levels.sort_unstable_by(|a, b| b.0.cmp(&a.0)),
        Side::Ask => levels.sort_unstable_by(|a, b| a.0.cmp(&b.0)),
    }
}

/// True if `bid_levels`/`ask_levels` would violate the no-cross invariant:
/// best bid >= best ask when both sides are populated.
pub fn would_cross(bid_levels: &[Level], ask_levels: &[Level]) -> bool {
    match (bid_levels.first(), ask_levels.first()) {
        (Some(&(bid, _)), Some(&(ask, _))) => bid >= ask,
        _ => false,
    }
}
