//! Capacity-constrained, priority-driven scheduler for tape/depth/
//! tick-by-tick subscription lines under a global broker line cap (§4.2).

pub mod feed;
pub mod triage;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::types::MarketDataConfig;
use crate::core::errors::{FeedErrorClass, SubscriptionError};
use crate::core::types::{RequestId, Symbol};

use feed::FeedAdapter;
use triage::{FocusCandidate, FocusConfig, FocusIncumbent};

/// Per-symbol subscription triple and the bookkeeping timestamps the
/// reconcile pass needs to decide focus rotation and cooldown expiry.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionState {
    pub mkt_data_id: Option<RequestId>,
    pub depth_id: Option<RequestId>,
    pub tick_by_tick_id: Option<RequestId>,
    pub subscribed_at_ms: u64,
    pub focus_since_ms: Option<u64>,
    pub last_tape_recv_ms: u64,
    pub last_depth_recv_ms: u64,
    pub warmup_trade_count: u32,
}

impl SubscriptionState {
    pub fn is_tape_enabled(&self) -> bool {
        self.mkt_data_id.is_some()
    }

    pub fn is_depth_enabled(&self) -> bool {
        self.depth_id.is_some()
    }

    pub fn is_tick_by_tick_enabled(&self) -> bool {
        self.tick_by_tick_id.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.is_tape_enabled() && self.is_depth_enabled() && self.is_tick_by_tick_enabled()
    }

    fn line_count(&self) -> u32 {
        self.is_tape_enabled() as u32 + self.is_depth_enabled() as u32 + self.is_tick_by_tick_enabled() as u32
    }
}

/// Outcome of one `apply_universe` reconcile pass, the payload of the
/// `UniverseUpdate` journal entry (§4.2 step 9).
#[derive(Debug, Clone, Default)]
pub struct UniverseUpdateSummary {
    pub active_universe: Vec<Symbol>,
    pub depth_set: Vec<Symbol>,
    pub evicted_from_focus: Vec<Symbol>,
    pub newly_subscribed: Vec<Symbol>,
    pub total_lines: u32,
}

/// The scheduler itself. `reconcile_lock` serializes `apply_universe` and
/// `handle_feed_error` mutations; state reads (`is_active`, etc.) are
/// lock-free `DashMap` reads.
pub struct MarketDataSubscriptionManager {
    states: DashMap<Symbol, SubscriptionState>,
    depth_cooldown_until_ms: DashMap<Symbol, u64>,
    tick_by_tick_cooldown_until_ms: AtomicU64,
    feed: std::sync::Arc<dyn FeedAdapter>,
    config: MarketDataConfig,
    focus_config: FocusConfig,
    reconcile_lock: Mutex<()>,
}

impl MarketDataSubscriptionManager {
    pub fn new(
        feed: std::sync::Arc<dyn FeedAdapter>,
        config: MarketDataConfig,
        focus_config: FocusConfig,
    ) -> Self {
        Self {
            states: DashMap::new(),
            depth_cooldown_until_ms: DashMap::new(),
            tick_by_tick_cooldown_until_ms: AtomicU64::new(0),
            feed,
            config,
            focus_config,
        }
    }

    pub fn is_tape_enabled(&self, symbol: &str) -> bool {
        self.states.get(symbol).map(|s| s.is_tape_enabled()).unwrap_or(false)
    }

    pub fn is_depth_enabled(&self, symbol: &str) -> bool {
        self.states.get(symbol).map(|s| s.is_depth_enabled()).unwrap_or(false)
    }

    pub fn is_active(&self, symbol: &str) -> bool {
        self.states.get(symbol).map(|s| s.is_active()).unwrap_or(false)
    }

    pub fn active_universe_snapshot(&self) -> Vec<Symbol> {
        self.states
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Current broker line usage, surfaced via `SubscriptionMetrics` (§4.8).
    pub fn total_lines(&self) -> u32 {
        self.states.iter().map(|e| e.value().line_count()).sum()
    }

    /// Symbols currently holding a depth subscription, surfaced via
    /// `SubscriptionMetrics::depth_cap_utilization` (§4.8).
    pub fn depth_enabled_count(&self) -> u32 {
        self.states.iter().filter(|e| e.value().is_depth_enabled()).count() as u32
    }

    /// Symbols currently serving out a depth-ineligible or tick-by-tick-cap
    /// cooldown, surfaced via `SubscriptionMetrics::cooldowns_active` (§4.8).
    pub fn cooldowns_active_count(&self, now_ms: u64) -> u32 {
        let depth_cooldowns = self.depth_cooldown_until_ms.iter().filter(|e| *e.value() > now_ms).count() as u32;
        let tbt_cooldown = if self.tick_by_tick_in_cooldown(now_ms) { 1 } else { 0 };
        depth_cooldowns + tbt_cooldown
    }

    pub fn record_tape_receipt(&self, symbol: &str, recv_ts_ms: u64) {
        if let Some(mut state) = self.states.get_mut(symbol) {
            state.last_tape_recv_ms = recv_ts_ms;
            state.warmup_trade_count += 1;
        }
    }

    pub fn record_depth_receipt(&self, symbol: &str, recv_ts_ms: u64) {
        if let Some(mut state) = self.states.get_mut(symbol) {
            state.last_depth_recv_ms = recv_ts_ms;
        }
    }

    /// Drive cooldowns from a broker-reported subscription error (§4.2,
    /// §7). `request_id` is accepted for symmetry with the feed contract
    /// but resolution here is by symbol, since the manager tracks ids by
    /// symbol rather than the reverse.
    pub fn handle_feed_error(&self, symbol: &str, code: i32, message: &str, now_ms: u64) {
        let class = FeedErrorClass::from_broker_code(code);
        warn!(symbol, code, message, %class, "feed reported a subscription error");
        match class {
            FeedErrorClass::DepthIneligible => {
                self.depth_cooldown_until_ms
                    .insert(symbol.to_string(), now_ms + self.config.depth_ineligible_cooldown_ms);
                if let Some(mut state) = self.states.get_mut(symbol) {
                    state.depth_id = None;
                    state.tick_by_tick_id = None;
                    state.focus_since_ms = None;
                }
                let _ = self.feed.disable_depth(symbol);
                let _ = self.feed.disable_tick_by_tick(symbol);
            }
            FeedErrorClass::TickByTickCapReached => {
                self.tick_by_tick_cooldown_until_ms
                    .store(now_ms + self.config.tick_by_tick_cap_cooldown_ms, Ordering::Release);
                if let Some(mut state) = self.states.get_mut(symbol) {
                    state.depth_id = None;
                    state.focus_since_ms = None;
                }
                let _ = self.feed.disable_depth(symbol);
            }
            FeedErrorClass::TransientSubscription => {}
        }
    }

    fn depth_in_cooldown(&self, symbol: &str, now_ms: u64) -> bool {
        self.depth_cooldown_until_ms
            .get(symbol)
            .map(|until| *until > now_ms)
            .unwrap_or(false)
    }

    fn tick_by_tick_in_cooldown(&self, now_ms: u64) -> bool {
        self.tick_by_tick_cooldown_until_ms.load(Ordering::Acquire) > now_ms
    }

    /// Run one reconcile pass against `candidates`, scored by
    /// `triage_scores` (§4.2 steps 1-9).
    pub fn apply_universe(
        &self,
        candidates: &[Symbol],
        triage_scores: &HashMap<Symbol, f64>,
        now_ms: u64,
    ) -> UniverseUpdateSummary {
        let _guard = self.reconcile_lock.lock().unwrap();

        // `max_lines` budgets *lines*, not symbols: each admitted candidate
        // costs at least one tape line, but up to `max_depth_symbols` of
        // them will be promoted to a 3-line focus slot (tape + depth +
        // tick-by-tick). Reserve those extra two lines per potential focus
        // slot up front so a full-size candidate set can't blow the cap the
        // moment the focus pass runs; `shed_to_line_cap` still cleans up
        // whatever this approximation misses.
        let max_admit = (self.config.max_lines as usize)
            .saturating_sub(2 * self.config.max_depth_symbols as usize)
            .max((self.config.max_depth_symbols as usize).min(self.config.max_lines as usize));
        let candidates: Vec<Symbol> = candidates.iter().take(max_admit).cloned().collect();

        let incumbents: Vec<FocusIncumbent> = self
            .states
            .iter()
            .filter(|entry| entry.value().is_depth_enabled())
            .map(|entry| {
                let state = entry.value();
                let focus_since = state.focus_since_ms.unwrap_or(now_ms);
                FocusIncumbent {
                    symbol: entry.key().clone(),
                    score: triage_scores.get(entry.key()).copied().unwrap_or(0.0),
                    focus_since_ms: focus_since,
                    tape_idle_ms: now_ms.saturating_sub(state.last_tape_recv_ms),
                    depth_idle_ms: now_ms.saturating_sub(state.last_depth_recv_ms),
                    warmup_met: state.warmup_trade_count >= self.focus_config.warmup_min_trades,
                }
            })
            .collect();

        let depth_candidates: Vec<FocusCandidate> = candidates
            .iter()
            .filter(|symbol| {
                !incumbents.iter().any(|i| &i.symbol == *symbol) && !self.depth_in_cooldown(symbol, now_ms)
            })
            .map(|symbol| FocusCandidate {
                symbol: symbol.clone(),
                score: triage_scores.get(symbol).copied().unwrap_or(0.0),
            })
            .collect();

        let decision = triage::select_depth_set(
            &incumbents,
            &depth_candidates,
            now_ms,
            &self.focus_config,
            self.config.max_depth_symbols as usize,
        );

        for symbol in &decision.evicted {
            let _ = self.feed.disable_depth(symbol);
            let _ = self.feed.disable_tick_by_tick(symbol);
            if let Some(mut state) = self.states.get_mut(symbol) {
                state.depth_id = None;
                state.tick_by_tick_id = None;
                state.focus_since_ms = None;
            }
            info!(symbol, "depth focus evicted");
        }

        let mut newly_subscribed = Vec::new();
        for symbol in &candidates {
            let already = self.states.contains_key(symbol);
            if !already {
                match self.feed.subscribe(symbol, false) {
                    Ok(ack) => {
                        self.states.insert(
                            symbol.clone(),
                            SubscriptionState {
                                mkt_data_id: Some(ack.mkt_data_id),
                                subscribed_at_ms: now_ms,
                                ..Default::default()
                            },
                        );
                        newly_subscribed.push(symbol.clone());
                    }
                    Err(err) => warn!(symbol, %err, "tape subscribe failed"),
                }
            }
        }

        if !self.tick_by_tick_in_cooldown(now_ms) {
            for symbol in &decision.new_focus {
                let already_depth = self.states.get(symbol).map(|s| s.is_depth_enabled()).unwrap_or(false);
                if already_depth || self.depth_in_cooldown(symbol, now_ms) {
                    continue;
                }
                match self.feed.subscribe(symbol, true) {
                    Ok(ack) => {
                        if let Some(depth_id) = ack.depth_id {
                            match self.feed.enable_tick_by_tick(symbol) {
                                Ok(tbt_id) => {
                                    if let Some(mut state) = self.states.get_mut(symbol) {
                                        state.depth_id = Some(depth_id);
                                        state.tick_by_tick_id = Some(tbt_id);
                                        state.focus_since_ms.get_or_insert(now_ms);
                                    }
                                }
                                Err(err) => {
                                    warn!(symbol, %err, "tick-by-tick enable failed, revoking depth");
                                    let _ = self.feed.disable_depth(symbol);
                                }
                            }
                        }
                    }
                    Err(err) => warn!(symbol, %err, "depth upgrade failed"),
                }
            }
        }

        self.shed_to_line_cap(&candidates, triage_scores, now_ms);

        let summary = UniverseUpdateSummary {
            active_universe: self.active_universe_snapshot(),
            depth_set: decision.new_focus.clone(),
            evicted_from_focus: decision.evicted.clone(),
            newly_subscribed,
            total_lines: self.total_lines(),
        };
        info!(
            active = summary.active_universe.len(),
            depth = summary.depth_set.len(),
            total_lines = summary.total_lines,
            "universe reconciled"
        );
        summary
    }

    /// A symbol subscribed within the last `min_hold_minutes` is immune
    /// from eviction-to-make-room (§4.2 `min_hold`) — except that immunity
    /// never lets `max_lines` stay exceeded, since that invariant is
    /// absolute (§8 invariant 5). So every pass below evicts non-held
    /// symbols first and only reaches into the held set if that wasn't
    /// enough to get back under cap.
    fn within_min_hold(&self, state: &SubscriptionState, now_ms: u64) -> bool {
        let min_hold_ms = self.config.min_hold_minutes as u64 * 60_000;
        now_ms.saturating_sub(state.subscribed_at_ms) < min_hold_ms
    }

    /// §4.2 step 5: if still over `max_lines` after the focus pass, drop
    /// tick-by-tick on non-candidates first (least-recently-active), then
    /// whole subscriptions (tape-first), preferring non-candidates; within
    /// each pass, symbols still inside their `min_hold` window are tried
    /// last. If the cap is still not met, down-tier the lowest-scored
    /// depth-focus symbols (drop tick-by-tick + depth, keep tape) — even if
    /// they are current candidates — since at that point the cap itself
    /// must win.
    fn shed_to_line_cap(&self, candidates: &[Symbol], triage_scores: &HashMap<Symbol, f64>, now_ms: u64) {
        if self.total_lines() <= self.config.max_lines {
            return;
        }

        let mut non_candidate_tbt: Vec<(Symbol, bool, u64)> = self
            .states
            .iter()
            .filter(|e| e.value().is_tick_by_tick_enabled() && !candidates.contains(e.key()))
            .map(|e| {
                let state = e.value();
                (
                    e.key().clone(),
                    self.within_min_hold(state, now_ms),
                    state.last_tape_recv_ms.max(state.last_depth_recv_ms),
                )
            })
            .collect();
        non_candidate_tbt.sort_by_key(|(_, held, last_active)| (*held, *last_active));

        for (symbol, _, _) in non_candidate_tbt {
            if self.total_lines() <= self.config.max_lines {
                return;
            }
            let _ = self.feed.disable_tick_by_tick(&symbol);
            let _ = self.feed.disable_depth(&symbol);
            if let Some(mut state) = self.states.get_mut(&symbol) {
                state.tick_by_tick_id = None;
                state.depth_id = None;
                state.focus_since_ms = None;
            }
        }

        if self.total_lines() <= self.config.max_lines {
            return;
        }

        let mut non_candidate_syms: Vec<(Symbol, bool)> = self
            .states
            .iter()
            .filter(|e| !candidates.contains(e.key()))
            .map(|e| (e.key().clone(), self.within_min_hold(e.value(), now_ms)))
            .collect();
        non_candidate_syms.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        for (symbol, _) in non_candidate_syms {
            if self.total_lines() <= self.config.max_lines {
                return;
            }
            let _ = self.feed.unsubscribe(&symbol);
            self.states.remove(&symbol);
            warn!(symbol, "subscription evicted to stay within max_lines");
        }

        if self.total_lines() <= self.config.max_lines {
            return;
        }

        // Still over cap with nothing left to drop among non-candidates:
        // down-tier the weakest focus symbols from 3 lines to 1.
        let mut focus_by_score: Vec<(Symbol, f64)> = self
            .states
            .iter()
            .filter(|e| e.value().is_depth_enabled())
            .map(|e| (e.key().clone(), triage_scores.get(e.key()).copied().unwrap_or(0.0)))
            .collect();
        focus_by_score.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        for (symbol, _) in focus_by_score {
            if self.total_lines() <= self.config.max_lines {
                return;
            }
            let _ = self.feed.disable_tick_by_tick(&symbol);
            let _ = self.feed.disable_depth(&symbol);
            if let Some(mut state) = self.states.get_mut(&symbol) {
                state.tick_by_tick_id = None;
                state.depth_id = None;
                state.focus_since_ms = None;
            }
            warn!(symbol, "depth/tick-by-tick down-tiered to stay within max_lines");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::feed::SubscribeAck;
    use std::sync::atomic::AtomicU64 as TestCounter;
    use std::sync::Arc;

    struct StubFeed {
        next_id: TestCounter,
    }

    impl StubFeed {
        fn new() -> Self {
            Self { next_id: TestCounter::new(1) }
        }
        fn id(&self) -> RequestId {
            RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
        }
    }

    impl FeedAdapter for StubFeed {
        fn subscribe(&self, _symbol: &str, include_depth: bool) -> Result<SubscribeAck, SubscriptionError> {
            Ok(SubscribeAck {
                mkt_data_id: self.id(),
                depth_id: if include_depth { Some(self.id()) } else { None },
                primary_exchange: "NASDAQ".to_string(),
            })
        }
        fn unsubscribe(&self, _symbol: &str) -> Result<(), SubscriptionError> {
            Ok(())
        }
        fn enable_tick_by_tick(&self, _symbol: &str) -> Result<RequestId, SubscriptionError> {
            Ok(self.id())
        }
        fn disable_tick_by_tick(&self, _symbol: &str) -> Result<(), SubscriptionError> {
            Ok(())
        }
        fn disable_depth(&self, _symbol: &str) -> Result<(), SubscriptionError> {
            Ok(())
        }
    }

    fn manager() -> MarketDataSubscriptionManager {
        MarketDataSubscriptionManager::new(
            Arc::new(StubFeed::new()),
            MarketDataConfig {
                max_lines: 10,
                max_depth_symbols: 2,
                ..MarketDataConfig::default()
            },
            FocusConfig::default(),
        )
    }

    #[test]
    fn depth_implies_tick_by_tick() {
        let manager = manager();
        let mut scores = HashMap::new();
        scores.insert("AAPL".to_string(), 90.0);
        let summary = manager.apply_universe(&["AAPL".to_string()], &scores, 0);
        assert!(summary.active_universe.contains(&"AAPL".to_string()));
        assert!(manager.is_active("AAPL"));
    }

    #[test]
    fn depth_ineligible_revokes_and_cools_down() {
        let manager = manager();
        let mut scores = HashMap::new();
        scores.insert("XYZ".to_string(), 90.0);
        manager.apply_universe(&["XYZ".to_string()], &scores, 0);
        assert!(manager.is_depth_enabled("XYZ"));

        manager.handle_feed_error("XYZ", 10092, "depth not supported", 1_000);
        assert!(!manager.is_depth_enabled("XYZ"));
        assert!(manager.depth_in_cooldown("XYZ", 1_000 + 1));
        assert!(!manager.depth_in_cooldown("XYZ", manager.config.depth_ineligible_cooldown_ms + 1_001));
    }

    #[test]
    fn max_lines_never_exceeded() {
        let manager = MarketDataSubscriptionManager::new(
            Arc::new(StubFeed::new()),
            MarketDataConfig {
                max_lines: 3,
                max_depth_symbols: 1,
                ..MarketDataConfig::default()
            },
            FocusConfig::default(),
        );
        let symbols: Vec<Symbol> = vec!["A".into(), "B".into(), "C".into(), "D".into()];
        let scores: HashMap<Symbol, f64> = symbols.iter().map(|s| (s.clone(), 50.0)).collect();
        manager.apply_universe(&symbols, &scores, 0);
        assert!(manager.total_lines() <= 3);
    }

    #[test]
    fn max_lines_never_exceeded_with_default_size_universe() {
        let manager = MarketDataSubscriptionManager::new(
            Arc::new(StubFeed::new()),
            MarketDataConfig {
                max_lines: 95,
                max_depth_symbols: 3,
                ..MarketDataConfig::default()
            },
            FocusConfig::default(),
        );
        let symbols: Vec<Symbol> = (0..95).map(|i| format!("SYM{:03}", i)).collect();
        let scores: HashMap<Symbol, f64> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), 100.0 - i as f64))
            .collect();
        manager.apply_universe(&symbols, &scores, 0);
        assert!(
            manager.total_lines() <= 95,
            "total_lines={} exceeds max_lines=95",
            manager.total_lines()
        );
    }

    #[test]
    fn min_hold_prefers_evicting_an_expired_hold_over_a_fresh_one() {
        let manager = MarketDataSubscriptionManager::new(
            Arc::new(StubFeed::new()),
            MarketDataConfig {
                max_lines: 2,
                max_depth_symbols: 0,
                min_hold_minutes: 5,
                ..MarketDataConfig::default()
            },
            FocusConfig::default(),
        );
        let mut scores = HashMap::new();
        scores.insert("D".to_string(), 50.0);
        manager.apply_universe(&["D".to_string()], &scores, 0);

        // 10 minutes later: D's hold has long expired. A is freshly
        // subscribed alongside it.
        scores.insert("A".to_string(), 50.0);
        manager.apply_universe(&["D".to_string(), "A".to_string()], &scores, 600_000);
        assert!(manager.is_tape_enabled("D"));
        assert!(manager.is_tape_enabled("A"));

        // Moments later, a brand-new candidate "B" needs a line, D and A
        // both fall out of the candidate set, and the cap forces exactly
        // one eviction. D's hold is long expired; A is still inside its
        // 5-minute hold, so D must be the one to go.
        let mut scores2 = HashMap::new();
        scores2.insert("B".to_string(), 50.0);
        manager.apply_universe(&["B".to_string()], &scores2, 600_100);

        assert!(!manager.is_tape_enabled("D"), "expired-hold symbol should be evicted first");
        assert!(manager.is_tape_enabled("A"), "symbol still inside min_hold should survive while an unprotected alternative exists");
        assert!(manager.total_lines() <= 2);
    }
}
