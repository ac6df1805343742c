//! Pure focus-rotation policy (§4.2, §9 design note): independently
//! testable without any broker or book state, only scores and timings.

use serde::{Deserialize, Serialize};

use crate::config::defaults;
use crate::core::types::Symbol;

/// Blended-weight inputs that feed a single 0-100 triage score.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriageFeatures {
    pub prints_per_sec_3s: f64,
    pub prints_per_sec_15s: f64,
    pub dollar_volume_15s: f64,
    pub relative_spread: f64,
    pub volatility_range_pct: f64,
    pub burst_ratio_3s_vs_15s: f64,
}

/// Blend weights for `compute_triage_score`. Sums to 1.0 by convention but
/// is not enforced; callers own normalization if they retune weights.
#[derive(Debug, Clone, Copy)]
pub struct TriageWeights {
    pub prints_3s: f64,
    pub prints_15s: f64,
    pub dollar_volume: f64,
    pub inverse_spread: f64,
    pub volatility: f64,
    pub burst_ratio: f64,
}

impl Default for TriageWeights {
    fn default() -> Self {
        Self {
            prints_3s: 0.25,
            prints_15s: 0.15,
            dollar_volume: 0.20,
            inverse_spread: 0.15,
            volatility: 0.15,
            burst_ratio: 0.10,
        }
    }
}

/// Blend `features` into a 0-100 triage score. Each raw input is squashed
/// through a soft saturation so one outlier feature can't dominate.
pub fn compute_triage_score(features: &TriageFeatures, weights: &TriageWeights) -> f64 {
    fn squash(x: f64, scale: f64) -> f64 {
        100.0 * (x / (x + scale)).clamp(0.0, 1.0)
    }

    let inverse_spread = if features.relative_spread > 0.0 {
        1.0 / features.relative_spread
    } else {
        0.0
    };

    let score = weights.prints_3s * squash(features.prints_per_sec_3s, 2.0)
        + weights.prints_15s * squash(features.prints_per_sec_15s, 1.0)
        + weights.dollar_volume * squash(features.dollar_volume_15s, 50_000.0)
        + weights.inverse_spread * squash(inverse_spread, 20.0)
        + weights.volatility * squash(features.volatility_range_pct, 1.0)
        + weights.burst_ratio * squash(features.burst_ratio_3s_vs_15s, 2.0);

    score.clamp(0.0, 100.0)
}

/// A symbol currently holding focus (depth + tick-by-tick), with the
/// timing facts needed to decide eviction eligibility.
#[derive(Debug, Clone)]
pub struct FocusIncumbent {
    pub symbol: Symbol,
    pub score: f64,
    pub focus_since_ms: u64,
    pub tape_idle_ms: u64,
    pub depth_idle_ms: u64,
    pub warmup_met: bool,
}

/// A symbol competing for a depth slot but not currently focused.
#[derive(Debug, Clone)]
pub struct FocusCandidate {
    pub symbol: Symbol,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FocusConfig {
    #[serde(default = "defaults::default_focus_min_dwell_ms")]
    pub min_dwell_ms: u64,
    #[serde(default = "defaults::default_focus_tape_idle_ms")]
    pub tape_idle_ms: u64,
    #[serde(default = "defaults::default_focus_depth_idle_ms")]
    pub depth_idle_ms: u64,
    #[serde(default = "defaults::default_focus_warmup_min_trades")]
    pub warmup_min_trades: u32,
    #[serde(default = "defaults::default_min_score_delta_to_swap")]
    pub min_score_delta_to_swap: f64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            min_dwell_ms: defaults::default_focus_min_dwell_ms(),
            tape_idle_ms: defaults::default_focus_tape_idle_ms(),
            depth_idle_ms: defaults::default_focus_depth_idle_ms(),
            warmup_min_trades: defaults::default_focus_warmup_min_trades(),
            min_score_delta_to_swap: defaults::default_min_score_delta_to_swap(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusDecision {
    pub new_focus: Vec<Symbol>,
    pub evicted: Vec<Symbol>,
}

fn is_evictable(incumbent: &FocusIncumbent, now_ms: u64, config: &FocusConfig) -> bool {
    let dwell_ms = now_ms.saturating_sub(incumbent.focus_since_ms);
    if dwell_ms < config.min_dwell_ms {
        return false;
    }
    let idle = incumbent.tape_idle_ms >= config.tape_idle_ms || incumbent.depth_idle_ms >= config.depth_idle_ms;
    idle || !incumbent.warmup_met
}

/// Decide the next depth focus set from the current incumbents and the
/// scored challenger pool. Pure function, no I/O, fully deterministic given
/// its inputs — the shape the design notes call for independent testing.
pub fn select_depth_set(
    incumbents: &[FocusIncumbent],
    candidates: &[FocusCandidate],
    now_ms: u64,
    config: &FocusConfig,
    depth_cap: usize,
) -> FocusDecision {
    let mut protected: Vec<(Symbol, f64)> = Vec::new();
    let mut contenders: Vec<(Symbol, f64)> = Vec::new();

    for incumbent in incumbents {
        if is_evictable(incumbent, now_ms, config) {
            contenders.push((incumbent.symbol.clone(), incumbent.score));
        } else {
            protected.push((incumbent.symbol.clone(), incumbent.score));
        }
    }
    for candidate in candidates {
        if !protected.iter().any(|(s, _)| s == &candidate.symbol)
            && !contenders.iter().any(|(s, _)| s == &candidate.symbol)
        {
            contenders.push((candidate.symbol.clone(), candidate.score));
        }
    }

    contenders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let free_slots = depth_cap.saturating_sub(protected.len());
    let mut filled: Vec<(Symbol, f64)> = contenders.iter().take(free_slots).cloned().collect();
    let mut leftover: Vec<(Symbol, f64)> = contenders.iter().skip(free_slots).cloned().collect();

    // Hysteresis: a leftover contender may still bump the weakest protected
    // incumbent if it clears the swap delta.
    protected.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    loop {
        let Some(weakest) = protected.first().cloned() else {
            break;
        };
        let Some(best_leftover) = leftover.first().cloned() else {
            break;
        };
        if best_leftover.1 >= weakest.1 + config.min_score_delta_to_swap {
            protected.remove(0);
            leftover.remove(0);
            filled.push(best_leftover);
        } else {
            break;
        }
    }

    let original: Vec<Symbol> = incumbents.iter().map(|i| i.symbol.clone()).collect();
    let mut new_focus: Vec<Symbol> = protected.into_iter().map(|(s, _)| s).collect();
    new_focus.extend(filled.into_iter().map(|(s, _)| s));

    let evicted: Vec<Symbol> = original
        .into_iter()
        .filter(|s| !new_focus.contains(s))
        .collect();

    FocusDecision { new_focus, evicted }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s5_focus_rotation() {
        let incumbents = vec![
            FocusIncumbent {
                symbol: "A".into(),
                score: 70.0,
                focus_since_ms: 0,
                tape_idle_ms: 31_000,
                depth_idle_ms: 0,
                warmup_met: true,
            },
            FocusIncumbent {
                symbol: "B".into(),
                score: 80.0,
                focus_since_ms: 0,
                tape_idle_ms: 0,
                depth_idle_ms: 0,
                warmup_met: true,
            },
        ];
        let candidates = vec![FocusCandidate {
            symbol: "C".into(),
            score: 90.0,
        }];
        let decision = select_depth_set(&incumbents, &candidates, 121_000, &FocusConfig::default(), 2);
        assert_eq!(decision.evicted, vec!["A".to_string()]);
        assert!(decision.new_focus.contains(&"B".to_string()));
        assert!(decision.new_focus.contains(&"C".to_string()));
        assert_eq!(decision.new_focus.len(), 2);
    }

    #[test]
    fn non_evictable_incumbent_survives_without_sufficient_delta() {
        let incumbents = vec![FocusIncumbent {
            symbol: "B".into(),
            score: 80.0,
            focus_since_ms: 0,
            tape_idle_ms: 0,
            depth_idle_ms: 0,
            warmup_met: true,
        }];
        let candidates = vec![FocusCandidate {
            symbol: "D".into(),
            score: 90.0,
        }];
        let decision = select_depth_set(&incumbents, &candidates, 1_000, &FocusConfig::default(), 1);
        assert_eq!(decision.new_focus, vec!["B".to_string()]);
        assert!(decision.evicted.is_empty());
    }

    #[test]
    fn score_clamped_to_0_100() {
        let score = compute_triage_score(
            &TriageFeatures {
                prints_per_sec_3s: 1000.0,
                prints_per_sec_15s: 1000.0,
                dollar_volume_15s: 10_000_000.0,
                relative_spread: 0.0001,
                volatility_range_pct: 10.0,
                burst_ratio_3s_vs_15s: 10.0,
            },
            &TriageWeights::default(),
        );
        assert!((0.0..=100.0).contains(&score));
    }
}
