//! Short ranking window that bounds the accepted-signal rate (§4.4).

use std::collections::VecDeque;
use std::sync::Mutex;

use dashmap::DashMap;

use crate::config::types::ScarcityConfig;
use crate::core::types::{DecisionId, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScarcityRejectReason {
    GlobalLimit,
    GlobalCooldown,
    SymbolLimit,
    SymbolCooldown,
    RejectedRankedOut,
}

impl std::fmt::Display for ScarcityRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScarcityRejectReason::GlobalLimit => "GlobalLimit",
            ScarcityRejectReason::GlobalCooldown => "GlobalCooldown",
            ScarcityRejectReason::SymbolLimit => "SymbolLimit",
            ScarcityRejectReason::SymbolCooldown => "SymbolCooldown",
            ScarcityRejectReason::RejectedRankedOut => "RejectedRankedOut",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOutcome {
    Accepted,
    Rejected(ScarcityRejectReason),
}

#[derive(Debug, Clone)]
pub struct RankedDecision {
    pub decision_id: DecisionId,
    pub symbol: Symbol,
    pub outcome: RankOutcome,
}

#[derive(Debug, Clone)]
struct PendingRankEntry {
    decision_id: DecisionId,
    symbol: Symbol,
    score: f64,
    staged_ts: u64,
}

/// Bounds acceptance rate via a short ranking window plus global and
/// per-symbol caps/cooldowns.
pub struct ScarcityController {
    pending: Mutex<Vec<PendingRankEntry>>,
    window_deadline_ms: Mutex<Option<u64>>,
    global_accepts: Mutex<VecDeque<u64>>,
    symbol_accepts: DashMap<Symbol, Mutex<VecDeque<u64>>>,
    config: ScarcityConfig,
}

impl ScarcityController {
    pub fn new(config: ScarcityConfig) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            window_deadline_ms: Mutex::new(None),
            global_accepts: Mutex::new(VecDeque::new()),
            symbol_accepts: DashMap::new(),
            config,
        }
    }

    /// Stage a candidate. If staging this candidate observes that the
    /// current window's deadline has already passed, the prior window is
    /// flushed first and its resolutions are returned alongside staging
    /// the new candidate into a fresh window.
    pub fn stage_candidate(&self, decision_id: DecisionId, symbol: Symbol, score: f64, now_ms: u64) -> Vec<RankedDecision> {
        let mut flushed = Vec::new();
        {
            let mut deadline = self.window_deadline_ms.lock().unwrap();
            if let Some(d) = *deadline {
                if now_ms >= d {
                    flushed = self.flush_locked(now_ms);
                    *deadline = None;
                }
            }
            if deadline.is_none() {
                *deadline = Some(now_ms + self.config.rank_window_ms);
            }
        }
        self.pending.lock().unwrap().push(PendingRankEntry {
            decision_id,
            symbol,
            score,
            staged_ts: now_ms,
        });
        flushed
    }

    /// Flush the current window if its deadline has elapsed. Intended to
    /// be called on a timer by the orchestrator so windows close even when
    /// no new candidate arrives to trigger the check in `stage_candidate`.
    pub fn flush_rank_window(&self, now_ms: u64) -> Vec<RankedDecision> {
        let mut deadline = self.window_deadline_ms.lock().unwrap();
        match *deadline {
            Some(d) if now_ms >= d => {
                let result = self.flush_locked(now_ms);
                *deadline = None;
                result
            }
            _ => Vec::new(),
        }
    }

    fn flush_locked(&self, now_ms: u64) -> Vec<RankedDecision> {
        let mut entries: Vec<PendingRankEntry> = self.pending.lock().unwrap().drain(..).collect();
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.staged_ts.cmp(&b.staged_ts))
                .then(a.symbol.cmp(&b.symbol))
        });

        let mut global_accepts = self.global_accepts.lock().unwrap();
        evict_older_than(&mut global_accepts, now_ms, self.config.global_window_ms);
        let global_accepted_already = global_accepts.len() as i64;
        let remaining_capacity = self.config.global_limit as i64 - global_accepted_already;

        let mut results = Vec::with_capacity(entries.len());
        let mut accepted_this_window = 0i64;

        for entry in entries {
            if remaining_capacity <= 0 {
                // Mirrors the symbol-level split below: a cap of exactly one
                // acceptance per window reads as a cooldown, a larger cap
                // that's merely exhausted reads as a limit.
                let reason = if global_accepted_already > 0 && self.config.global_limit <= 1 {
                    ScarcityRejectReason::GlobalCooldown
                } else {
                    ScarcityRejectReason::GlobalLimit
                };
                results.push(RankedDecision {
                    decision_id: entry.decision_id,
                    symbol: entry.symbol,
                    outcome: RankOutcome::Rejected(reason),
                });
                continue;
            }

            let symbol_history = self
                .symbol_accepts
                .entry(entry.symbol.clone())
                .or_insert_with(|| Mutex::new(VecDeque::new()));
            let mut symbol_guard = symbol_history.lock().unwrap();
            evict_older_than(&mut symbol_guard, now_ms, self.config.symbol_cooldown_ms);

            if !symbol_guard.is_empty() && self.config.symbol_limit <= 1 {
                drop(symbol_guard);
                results.push(RankedDecision {
                    decision_id: entry.decision_id,
                    symbol: entry.symbol,
                    outcome: RankOutcome::Rejected(ScarcityRejectReason::SymbolCooldown),
                });
                continue;
            }
            if symbol_guard.len() as u32 >= self.config.symbol_limit {
                drop(symbol_guard);
                results.push(RankedDecision {
                    decision_id: entry.decision_id,
                    symbol: entry.symbol,
                    outcome: RankOutcome::Rejected(ScarcityRejectReason::SymbolLimit),
                });
                continue;
            }

            if accepted_this_window < remaining_capacity {
                symbol_guard.push_back(now_ms);
                drop(symbol_guard);
                global_accepts.push_back(now_ms);
                accepted_this_window += 1;
                results.push(RankedDecision {
                    decision_id: entry.decision_id,
                    symbol: entry.symbol,
                    outcome: RankOutcome::Accepted,
                });
            } else {
                drop(symbol_guard);
                results.push(RankedDecision {
                    decision_id: entry.decision_id,
                    symbol: entry.symbol,
                    outcome: RankOutcome::Rejected(ScarcityRejectReason::RejectedRankedOut),
                });
            }
        }

        results
    }
}

fn evict_older_than(queue: &mut VecDeque<u64>, now_ms: u64, max_age_ms: u64) {
    while let Some(&front) = queue.front() {
        if now_ms.saturating_sub(front) > max_age_ms {
            queue.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScarcityConfig {
        ScarcityConfig {
            rank_window_ms: 250,
            global_limit: 1,
            global_window_ms: 3_600_000,
            symbol_limit: 1,
            symbol_cooldown_ms: 600_000,
        }
    }

    #[test]
    fn scenario_s6_ranked_out_within_window() {
        let controller = ScarcityController::new(config());
        let a = DecisionId::new();
        let b = DecisionId::new();
        let c = DecisionId::new();
        controller.stage_candidate(a, "AAA".to_string(), 9.0, 0);
        controller.stage_candidate(b, "BBB".to_string(), 8.2, 50);
        controller.stage_candidate(c, "CCC".to_string(), 7.5, 100);

        let results = controller.flush_rank_window(250);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].decision_id, a);
        assert_eq!(results[0].outcome, RankOutcome::Accepted);
        assert_eq!(
            results[1].outcome,
            RankOutcome::Rejected(ScarcityRejectReason::RejectedRankedOut)
        );
        assert_eq!(
            results[2].outcome,
            RankOutcome::Rejected(ScarcityRejectReason::RejectedRankedOut)
        );
    }

    #[test]
    fn every_staged_candidate_resolves_exactly_once() {
        let controller = ScarcityController::new(ScarcityConfig {
            global_limit: 10,
            ..config()
        });
        let id = DecisionId::new();
        let flushed_immediately = controller.stage_candidate(id, "AAA".to_string(), 5.0, 0);
        assert!(flushed_immediately.is_empty());
        let results = controller.flush_rank_window(251);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, RankOutcome::Accepted);
    }

    #[test]
    fn symbol_cooldown_blocks_repeat_within_window() {
        let controller = ScarcityController::new(ScarcityConfig {
            global_limit: 10,
            ..config()
        });
        controller.stage_candidate(DecisionId::new(), "AAA".to_string(), 9.0, 0);
        let results = controller.flush_rank_window(250);
        assert_eq!(results[0].outcome, RankOutcome::Accepted);

        controller.stage_candidate(DecisionId::new(), "AAA".to_string(), 9.0, 300);
        let results = controller.flush_rank_window(550);
        assert_eq!(
            results[0].outcome,
            RankOutcome::Rejected(ScarcityRejectReason::SymbolCooldown)
        );
    }

    #[test]
    fn global_cooldown_blocks_next_symbol_when_limit_is_one() {
        let controller = ScarcityController::new(config());
        controller.stage_candidate(DecisionId::new(), "AAA".to_string(), 9.0, 0);
        let results = controller.flush_rank_window(250);
        assert_eq!(results[0].outcome, RankOutcome::Accepted);

        // Different symbol, so this isn't blocked by SymbolCooldown; the
        // global cap (limit=1) is what rejects it.
        controller.stage_candidate(DecisionId::new(), "BBB".to_string(), 9.0, 300);
        let results = controller.flush_rank_window(550);
        assert_eq!(
            results[0].outcome,
            RankOutcome::Rejected(ScarcityRejectReason::GlobalCooldown)
        );
    }

    #[test]
    fn global_limit_used_when_cap_is_above_one() {
        let controller = ScarcityController::new(ScarcityConfig {
            global_limit: 2,
            ..config()
        });
        controller.stage_candidate(DecisionId::new(), "AAA".to_string(), 9.0, 0);
        controller.stage_candidate(DecisionId::new(), "BBB".to_string(), 9.0, 0);
        let results = controller.flush_rank_window(250);
        assert_eq!(results[0].outcome, RankOutcome::Accepted);
        assert_eq!(results[1].outcome, RankOutcome::Accepted);

        controller.stage_candidate(DecisionId::new(), "CCC".to_string(), 9.0, 300);
        let results = controller.flush_rank_window(550);
        assert_eq!(
            results[0].outcome,
            RankOutcome::Rejected(ScarcityRejectReason::GlobalLimit)
        );
    }
}
