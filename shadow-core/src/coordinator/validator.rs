//! `OrderFlowSignalValidator`: turns a `MetricSnapshot` into a candidate
//! direction + confidence, and applies the duplicate/throttle suppression
//! rules (§4.3 step 7).

use std::collections::VecDeque;
use std::sync::Mutex;

use dashmap::DashMap;

use crate::core::types::{Direction, Symbol};
use crate::metrics::MetricSnapshot;

/// A candidate signal never gets a second look on the same symbol within
/// this window.
pub const DUPLICATE_SUPPRESSION_MS: u64 = 10 * 60 * 1000;
/// At most this many accepted signals per symbol per rolling hour.
pub const MAX_ACCEPTS_PER_HOUR: usize = 3;
const THROTTLE_WINDOW_MS: u64 = 60 * 60 * 1000;

/// Queue-imbalance deviation from neutral (0.5) below which no candidate
/// is raised at all.
const MIN_IMBALANCE_DEVIATION: f64 = 0.1;
/// Confidence (0-10 scale) required to accept rather than merely propose.
const ACCEPT_CONFIDENCE_THRESHOLD: f64 = 6.0;

#[derive(Debug, Clone, Copy)]
pub struct SignalInfo {
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    Duplicate,
    Throttled,
    LowConfidence,
    SpoofSuspected,
    ReplenishmentSuspected,
    AbsorptionInsufficient,
    BlueprintUnavailable,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectionReason::Duplicate => "Duplicate",
            RejectionReason::Throttled => "Throttled",
            RejectionReason::LowConfidence => "LowConfidence",
            RejectionReason::SpoofSuspected => "SpoofSuspected",
            RejectionReason::ReplenishmentSuspected => "ReplenishmentSuspected",
            RejectionReason::AbsorptionInsufficient => "AbsorptionInsufficient",
            RejectionReason::BlueprintUnavailable => "BlueprintUnavailable",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub has_candidate: bool,
    pub direction: Option<Direction>,
    pub accepted: bool,
    pub signal: Option<SignalInfo>,
    pub rejection_reason: Option<RejectionReason>,
}

impl Decision {
    pub fn silent() -> Self {
        Self {
            has_candidate: false,
            direction: None,
            accepted: false,
            signal: None,
            rejection_reason: None,
        }
    }
}

/// Stateful validator: one instance shared across symbols, keyed
/// internally by symbol for duplicate/throttle bookkeeping.
#[derive(Default)]
pub struct OrderFlowSignalValidator {
    last_accepted_ms: DashMap<Symbol, u64>,
    accept_history: DashMap<Symbol, Mutex<VecDeque<u64>>>,
}

impl OrderFlowSignalValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(&self, snapshot: &MetricSnapshot, now_ms: u64) -> Decision {
        let deviation = snapshot.queue_imbalance - 0.5;
        if deviation.abs() < MIN_IMBALANCE_DEVIATION {
            return Decision::silent();
        }

        let direction = if deviation > 0.0 { Direction::Buy } else { Direction::Sell };
        let confidence = ((deviation.abs() * 10.0) + snapshot.tape_acceleration.clamp(-2.0, 2.0)
            + if snapshot.vwap_reclaim_detected(matches!(direction, Direction::Buy)) {
                0.5
            } else {
                0.0
            })
        .clamp(0.0, 10.0);

        let mut decision = Decision {
            has_candidate: true,
            direction: Some(direction),
            accepted: false,
            signal: Some(SignalInfo { confidence }),
            rejection_reason: None,
        };

        if let Some(last) = self.last_accepted_ms.get(&snapshot.symbol) {
            if now_ms.saturating_sub(*last) < DUPLICATE_SUPPRESSION_MS {
                decision.rejection_reason = Some(RejectionReason::Duplicate);
                return decision;
            }
        }

        if self.accepts_in_last_hour(&snapshot.symbol, now_ms) >= MAX_ACCEPTS_PER_HOUR {
            decision.rejection_reason = Some(RejectionReason::Throttled);
            return decision;
        }

        if confidence < ACCEPT_CONFIDENCE_THRESHOLD {
            decision.rejection_reason = Some(RejectionReason::LowConfidence);
            return decision;
        }

        decision.accepted = true;
        decision
    }

    /// Call once a candidate clears every downstream filter and is staged;
    /// updates duplicate/throttle bookkeeping.
    pub fn record_accepted(&self, symbol: &Symbol, now_ms: u64) {
        self.last_accepted_ms.insert(symbol.clone(), now_ms);
        let history = self.accept_history.entry(symbol.clone()).or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut guard = history.lock().unwrap();
        guard.push_back(now_ms);
        while let Some(&front) = guard.front() {
            if now_ms.saturating_sub(front) > THROTTLE_WINDOW_MS {
                guard.pop_front();
            } else {
                break;
            }
        }
    }

    fn accepts_in_last_hour(&self, symbol: &Symbol, now_ms: u64) -> usize {
        self.accept_history
            .get(symbol)
            .map(|history| {
                let guard = history.lock().unwrap();
                guard.iter().filter(|&&ts| now_ms.saturating_sub(ts) <= THROTTLE_WINDOW_MS).count()
            })
            .unwrap_or(0)
    }
}
