//! Anti-spoof, replenishment, and absorption filters run after the
//! validator accepts a candidate (§4.3 steps 10-12).

use crate::core::types::fixed_point::to_f64;
use crate::core::types::{Direction, Side};
use crate::metrics::MetricSnapshot;
use crate::orderbook::trackers::DepthDeltaSnapshot;

/// Cancel count threshold on the 1s window for the anti-spoof check.
pub const ANTI_SPOOF_CANCEL_COUNT_THRESHOLD: u32 = 4;
/// Cancel-to-add ratio threshold shared by the 1s and 3s anti-spoof checks.
pub const ANTI_SPOOF_RATIO_THRESHOLD: f64 = 2.0;

/// Minimum opposing-side add count / size for the replenishment filter.
pub const REPLENISHMENT_ADD_COUNT_THRESHOLD: u32 = 3;
pub const REPLENISHMENT_ADD_SIZE_THRESHOLD: f64 = 10.0;
pub const REPLENISHMENT_RATIO_CEILING: f64 = 2.0;

/// Minimum trades/volume in the 3s window for the absorption filter.
pub const ABSORPTION_MIN_TRADES_3S: usize = 2;
pub const ABSORPTION_MIN_VOLUME_3S: f64 = 1.0;

/// The book side whose resting liquidity a given direction's signal leans
/// on — the bid for a BUY candidate (bid wall driving the imbalance), the
/// ask for a SELL candidate.
pub fn trigger_side(direction: Direction) -> Side {
    match direction {
        Direction::Buy => Side::Bid,
        Direction::Sell => Side::Ask,
    }
}

fn delta_for(snapshot: &MetricSnapshot, side: Side, window_3s: bool) -> &DepthDeltaSnapshot {
    match (side, window_3s) {
        (Side::Bid, false) => &snapshot.bid_delta_1s,
        (Side::Bid, true) => &snapshot.bid_delta_3s,
        (Side::Ask, false) => &snapshot.ask_delta_1s,
        (Side::Ask, true) => &snapshot.ask_delta_3s,
    }
}

/// §4.3 step 10: reject if the trigger side shows a 1s cancel burst with a
/// high cancel-to-add ratio, confirmed by the 3s window, with the tape
/// silent (no prints, no volume) — i.e. size being pulled with nothing
/// trading through it.
pub fn anti_spoof_suspected(snapshot: &MetricSnapshot, direction: Direction) -> bool {
    let side = trigger_side(direction);
    let one_s = delta_for(snapshot, side, false);
    let three_s = delta_for(snapshot, side, true);

    let one_s_trips = one_s.delete_count >= ANTI_SPOOF_CANCEL_COUNT_THRESHOLD
        && one_s.cancel_to_add_ratio() >= ANTI_SPOOF_RATIO_THRESHOLD
        && one_s.canceled_size >= one_s.added_size;
    let three_s_trips = three_s.cancel_to_add_ratio() >= ANTI_SPOOF_RATIO_THRESHOLD && three_s.delete_count >= 1;
    let tape_silent = snapshot.trades_in_3sec <= 1 && snapshot.window_volume == 0;

    one_s_trips && three_s_trips && tape_silent
}

/// §4.3 step 11: reject if the opposing side is being aggressively
/// replenished (adds, not cancels) while the tape stays quiet — liquidity
/// is being rebuilt against the candidate's direction.
pub fn replenishment_suspected(snapshot: &MetricSnapshot, direction: Direction) -> bool {
    let opposing = trigger_side(direction).opposite();
    let one_s = delta_for(snapshot, opposing, false);

    let enough_adds = one_s.insert_count >= REPLENISHMENT_ADD_COUNT_THRESHOLD
        && to_f64(one_s.added_size) >= REPLENISHMENT_ADD_SIZE_THRESHOLD;
    let tape_quiet = snapshot.trades_in_3sec <= 1 && snapshot.window_volume <= 0;
    let not_spoofing = one_s.cancel_to_add_ratio() < REPLENISHMENT_RATIO_CEILING;

    enough_adds && tape_quiet && not_spoofing
}

/// §4.3 step 12: require at least minimal tape confirmation before a
/// candidate is allowed through.
pub fn absorption_sufficient(snapshot: &MetricSnapshot) -> bool {
    snapshot.trades_in_3sec >= ABSORPTION_MIN_TRADES_3S && to_f64(snapshot.window_volume) >= ABSORPTION_MIN_VOLUME_3S
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::fixed_point::from_f64;
    use crate::core::types::Symbol;

    fn base_snapshot() -> MetricSnapshot {
        MetricSnapshot {
            symbol: Symbol::from("AAPL"),
            timestamp_ms: 0,
            best_bid: Some(from_f64(262.00)),
            best_ask: Some(from_f64(262.02)),
            spread: Some(from_f64(0.02)),
            mid_price: Some(from_f64(262.01)),
            queue_imbalance: 0.6,
            bid_wall_age_ms: 5_000,
            ask_wall_age_ms: 1_000,
            bid_absorption_rate: 0.0,
            ask_absorption_rate: 0.0,
            tape_acceleration: 0.0,
            trades_in_3sec: 4,
            bid_trades_in_3sec: 0,
            ask_trades_in_3sec: 4,
            bid_delta_1s: Default::default(),
            ask_delta_1s: Default::default(),
            bid_delta_3s: Default::default(),
            ask_delta_3s: Default::default(),
            cumulative_vwap: 261.80,
            window_vwap: 261.70,
            window_volume: from_f64(20.0),
            last_trade_price: Some(from_f64(262.01)),
        }
    }

    #[test]
    fn scenario_s2_spoof_detected() {
        let mut snapshot = base_snapshot();
        snapshot.bid_delta_1s.delete_count = 6;
        snapshot.bid_delta_1s.insert_count = 2;
        snapshot.bid_delta_1s.canceled_size = from_f64(20_000.0);
        snapshot.bid_delta_1s.added_size = from_f64(5_000.0);
        snapshot.bid_delta_3s.delete_count = 6;
        snapshot.bid_delta_3s.canceled_size = from_f64(24_000.0);
        snapshot.bid_delta_3s.added_size = from_f64(10_000.0);
        snapshot.trades_in_3sec = 0;
        snapshot.window_volume = 0;

        assert!(anti_spoof_suspected(&snapshot, Direction::Buy));
    }

    #[test]
    fn healthy_signal_not_flagged_as_spoof() {
        let snapshot = base_snapshot();
        assert!(!anti_spoof_suspected(&snapshot, Direction::Buy));
    }

    #[test]
    fn absorption_requires_tape_confirmation() {
        let mut snapshot = base_snapshot();
        snapshot.trades_in_3sec = 1;
        assert!(!absorption_sufficient(&snapshot));
        snapshot.trades_in_3sec = 2;
        assert!(absorption_sufficient(&snapshot));
    }

    #[test]
    fn replenishment_detects_opposing_rebuild() {
        let mut snapshot = base_snapshot();
        snapshot.ask_delta_1s.insert_count = 4;
        snapshot.ask_delta_1s.added_size = from_f64(15.0);
        snapshot.ask_delta_1s.canceled_size = 0;
        snapshot.trades_in_3sec = 0;
        snapshot.window_volume = 0;
        assert!(replenishment_suspected(&snapshot, Direction::Buy));
    }
}
