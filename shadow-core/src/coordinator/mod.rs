//! `ShadowTradingCoordinator`: the gated decision pipeline (§4.3).

pub mod blueprint;
pub mod filters;
pub mod quality_monitor;
pub mod validator;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::types::{ShadowTradingConfig, TapeGateConfig};
use crate::core::types::{DecisionId, Direction, SessionId, Symbol, TradingMode};
use crate::journal::{DecisionOutcome, EntryType, JournalEntry, JournalSink};
use crate::metrics::MetricSnapshot;
use crate::orderbook::OrderBookState;
use crate::scarcity::{RankOutcome, RankedDecision, ScarcityController};
use crate::subscription::MarketDataSubscriptionManager;

use blueprint::Blueprint;
use quality_monitor::PostSignalQualityMonitor;
use validator::OrderFlowSignalValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeStatus {
    Ready,
    NotWarmedUp,
    Stale,
    MissingSubscription,
}

/// Why a snapshot produced no accepted signal, beyond scarcity-level
/// reasons (those live in `scarcity::ScarcityRejectReason`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    BookInvalid,
    NoDepth,
    TapeMissingSubscription,
    NotWarmedUp,
    Stale,
}

impl std::fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotReadyReason::BookInvalid => "BookInvalid",
            NotReadyReason::NoDepth => "NoDepth",
            NotReadyReason::TapeMissingSubscription => "TapeMissingSubscription",
            NotReadyReason::NotWarmedUp => "NotWarmedUp",
            NotReadyReason::Stale => "Stale",
        };
        write!(f, "{}", s)
    }
}

struct StagedCandidate {
    symbol: Symbol,
    direction: Direction,
    blueprint: Blueprint,
    confidence: f64,
    snapshot: MetricSnapshot,
}

/// Wall-clock recheck cadence for the tape-warmup watchlist, driven by the
/// orchestrator's timer (§4.3 step 6).
pub const TAPE_WATCHLIST_DEFAULT_RECHECK_MS: u64 = 5_000;

/// For every fresh `MetricSnapshot` of an Active symbol, runs the gated
/// pipeline and produces exactly one journal entry per call (plus any
/// deferred resolutions handed back by the scarcity controller).
pub struct ShadowTradingCoordinator {
    validator: OrderFlowSignalValidator,
    quality_monitor: PostSignalQualityMonitor,
    scarcity: Arc<ScarcityController>,
    journal: Arc<dyn JournalSink>,
    config: ShadowTradingConfig,
    tape_gate_config: TapeGateConfig,
    last_eval_ms: DashMap<Symbol, u64>,
    tape_watchlist: DashMap<Symbol, u64>,
    staged: DashMap<DecisionId, StagedCandidate>,
    session_id: SessionId,
    trading_mode: TradingMode,
    next_decision_seq: AtomicU64,
}

impl ShadowTradingCoordinator {
    pub fn new(
        scarcity: Arc<ScarcityController>,
        journal: Arc<dyn JournalSink>,
        config: ShadowTradingConfig,
        tape_gate_config: TapeGateConfig,
        session_id: SessionId,
        trading_mode: TradingMode,
    ) -> Self {
        Self {
            validator: OrderFlowSignalValidator::new(),
            quality_monitor: PostSignalQualityMonitor::new(config.clone()),
            scarcity,
            journal,
            config,
            tape_gate_config,
            last_eval_ms: DashMap::new(),
            tape_watchlist: DashMap::new(),
            staged: DashMap::new(),
            session_id,
            trading_mode,
            next_decision_seq: AtomicU64::new(0),
        }
    }

    fn new_decision_id(&self) -> DecisionId {
        self.next_decision_seq.fetch_add(1, Ordering::Relaxed);
        DecisionId::new()
    }

    fn emit(
        &self,
        decision_id: DecisionId,
        entry_type: EntryType,
        symbol: &str,
        outcome: DecisionOutcome,
        rejection_reason: Option<String>,
        now_ms: u64,
    ) {
        let mut entry = JournalEntry::new(
            self.session_id,
            decision_id,
            entry_type,
            self.trading_mode,
            symbol.to_string(),
            outcome,
            timestamp_to_utc_string(now_ms),
            timestamp_to_utc_string(now_ms),
        );
        entry.rejection_reason = rejection_reason;
        self.journal.record(entry);
    }

    fn classify_tape(&self, book: &OrderBookState, snapshot: &MetricSnapshot, tape_enabled: bool, now_ms: u64) -> TapeStatus {
        if !tape_enabled {
            return TapeStatus::MissingSubscription;
        }
        let prints_in_warmup_window = book.tape.trades_in(now_ms, self.tape_gate_config.warmup_window_ms);
        if prints_in_warmup_window < self.tape_gate_config.warmup_min_trades as usize {
            return TapeStatus::NotWarmedUp;
        }
        let stale = match snapshot.last_trade_price {
            None => true,
            Some(_) => now_ms.saturating_sub(snapshot.timestamp_ms) > self.tape_gate_config.stale_window_ms,
        };
        if stale {
            return TapeStatus::Stale;
        }
        TapeStatus::Ready
    }

    /// Run the full gated pipeline for one fresh snapshot. Returns any
    /// `RankedDecision`s this call incidentally flushed from a prior
    /// scarcity window (callers should feed these to `resolve`).
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate_snapshot(
        &self,
        book: &OrderBookState,
        subscriptions: &MarketDataSubscriptionManager,
        snapshot: &MetricSnapshot,
        now_ms: u64,
    ) -> Vec<RankedDecision> {
        let symbol = snapshot.symbol.clone();

        // Step 1: active-universe gate.
        if !subscriptions.is_active(&symbol) {
            debug!(symbol = %symbol, "snapshot skipped: symbol not in active universe");
            return Vec::new();
        }

        // Step 2: post-signal quality monitor for any currently-accepted signal.
        if let Some(cancellation) = self.quality_monitor.evaluate(&symbol, snapshot, now_ms) {
            let mut entry = JournalEntry::new(
                self.session_id,
                cancellation.decision_id,
                EntryType::Canceled,
                self.trading_mode,
                symbol.clone(),
                DecisionOutcome::Canceled,
                timestamp_to_utc_string(now_ms),
                timestamp_to_utc_string(now_ms),
            );
            entry.rejection_reason = Some(cancellation.reason.to_string());
            entry.decision_result = serde_json::to_value(serde_json::json!({
                "current_spread": cancellation.current_spread,
                "baseline_spread": cancellation.baseline_spread,
                "current_side_velocity": cancellation.current_side_velocity,
                "baseline_side_velocity": cancellation.baseline_side_velocity,
            }))
            .ok();
            self.journal.record(entry);
        }

        // Step 3: per-symbol evaluation throttle.
        if let Some(last) = self.last_eval_ms.get(&symbol) {
            if now_ms.saturating_sub(*last) < self.config.signal_evaluation_throttle_ms {
                return Vec::new();
            }
        }
        self.last_eval_ms.insert(symbol.clone(), now_ms);

        // Step 4: book validity gate.
        if let Err(_reason) = book.is_book_valid(now_ms) {
            self.emit(
                self.new_decision_id(),
                EntryType::Rejection,
                &symbol,
                DecisionOutcome::NotReady,
                Some(NotReadyReason::BookInvalid.to_string()),
                now_ms,
            );
            return Vec::new();
        }

        // Step 5: subscription gate.
        if !subscriptions.is_depth_enabled(&symbol) {
            self.emit(
                self.new_decision_id(),
                EntryType::Rejection,
                &symbol,
                DecisionOutcome::NotReady,
                Some(NotReadyReason::NoDepth.to_string()),
                now_ms,
            );
            return Vec::new();
        }

        // Step 6: tape status gate.
        let tape_enabled = subscriptions.is_tape_enabled(&symbol);
        match self.classify_tape(book, snapshot, tape_enabled, now_ms) {
            TapeStatus::Ready => {
                self.tape_watchlist.remove(&symbol);
            }
            TapeStatus::NotWarmedUp => {
                if self.config.tape_watchlist_enabled {
                    self.tape_watchlist.insert(symbol.clone(), now_ms);
                }
                self.emit(
                    self.new_decision_id(),
                    EntryType::Rejection,
                    &symbol,
                    DecisionOutcome::NotReady,
                    Some(NotReadyReason::NotWarmedUp.to_string()),
                    now_ms,
                );
                return Vec::new();
            }
            TapeStatus::Stale => {
                self.emit(
                    self.new_decision_id(),
                    EntryType::Rejection,
                    &symbol,
                    DecisionOutcome::NotReady,
                    Some(NotReadyReason::Stale.to_string()),
                    now_ms,
                );
                return Vec::new();
            }
            TapeStatus::MissingSubscription => {
                self.emit(
                    self.new_decision_id(),
                    EntryType::Rejection,
                    &symbol,
                    DecisionOutcome::NotReady,
                    Some(NotReadyReason::TapeMissingSubscription.to_string()),
                    now_ms,
                );
                return Vec::new();
            }
        }

        // Step 7: validator decision.
        let decision = self.validator.evaluate(snapshot, now_ms);

        // Step 8: silent return if there was never a candidate.
        if !decision.has_candidate {
            return Vec::new();
        }
        let direction = decision.direction.expect("has_candidate implies direction");

        // Step 9: validator rejected outright.
        if !decision.accepted {
            let reason = decision
                .rejection_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "Unspecified".to_string());
            self.emit(
                self.new_decision_id(),
                EntryType::Rejection,
                &symbol,
                DecisionOutcome::Rejected,
                Some(reason),
                now_ms,
            );
            return Vec::new();
        }

        // Step 10: anti-spoof filter.
        if filters::anti_spoof_suspected(snapshot, direction) {
            self.emit(
                self.new_decision_id(),
                EntryType::Rejection,
                &symbol,
                DecisionOutcome::Rejected,
                Some(validator::RejectionReason::SpoofSuspected.to_string()),
                now_ms,
            );
            return Vec::new();
        }

        // Step 11: replenishment filter.
        if filters::replenishment_suspected(snapshot, direction) {
            self.emit(
                self.new_decision_id(),
                EntryType::Rejection,
                &symbol,
                DecisionOutcome::Rejected,
                Some(validator::RejectionReason::ReplenishmentSuspected.to_string()),
                now_ms,
            );
            return Vec::new();
        }

        // Step 12: absorption filter.
        if !filters::absorption_sufficient(snapshot) {
            self.emit(
                self.new_decision_id(),
                EntryType::Rejection,
                &symbol,
                DecisionOutcome::Rejected,
                Some(validator::RejectionReason::AbsorptionInsufficient.to_string()),
                now_ms,
            );
            return Vec::new();
        }

        // Step 13: blueprint construction.
        let (best_bid, best_ask) = match (snapshot.best_bid, snapshot.best_ask) {
            (Some(b), Some(a)) => (b, a),
            _ => {
                self.emit(
                    self.new_decision_id(),
                    EntryType::Rejection,
                    &symbol,
                    DecisionOutcome::Rejected,
                    Some(validator::RejectionReason::BlueprintUnavailable.to_string()),
                    now_ms,
                );
                return Vec::new();
            }
        };
        let blueprint = match blueprint::construct(direction, best_bid, best_ask) {
            Ok(bp) => bp,
            Err(reason) => {
                self.emit(
                    self.new_decision_id(),
                    EntryType::Rejection,
                    &symbol,
                    DecisionOutcome::Rejected,
                    Some(format!("BlueprintUnavailable:{}", reason)),
                    now_ms,
                );
                return Vec::new();
            }
        };

        // Step 14: VWAP reclaim bonus.
        let base_confidence = decision.signal.map(|s| s.confidence).unwrap_or(0.0);
        let vwap_bonus = if snapshot.vwap_reclaim_detected(matches!(direction, Direction::Buy)) {
            0.5
        } else {
            0.0
        };
        let rank_score = base_confidence + vwap_bonus;

        // Step 15: scarcity staging.
        let decision_id = self.new_decision_id();
        self.staged.insert(
            decision_id,
            StagedCandidate {
                symbol: symbol.clone(),
                direction,
                blueprint,
                confidence: base_confidence,
                snapshot: snapshot.clone(),
            },
        );
        self.validator.record_accepted(&symbol, now_ms);

        let mut entry = JournalEntry::new(
            self.session_id,
            decision_id,
            EntryType::Signal,
            self.trading_mode,
            symbol.clone(),
            DecisionOutcome::Pending,
            timestamp_to_utc_string(now_ms),
            timestamp_to_utc_string(now_ms),
        );
        entry.gate_trace = serde_json::to_value(serde_json::json!({"stage": "AwaitingScarcityRanking"})).ok();
        entry.blueprint = serde_json::to_value(serde_json::json!({
            "direction": direction.to_string(),
            "entry": blueprint.entry,
            "stop": blueprint.stop,
            "target": blueprint.target,
        }))
        .ok();
        entry.decision_result = serde_json::to_value(serde_json::json!({"rank_score": rank_score})).ok();
        self.journal.record(entry);

        let flushed = self.scarcity.stage_candidate(decision_id, symbol, rank_score, now_ms);
        self.resolve(&flushed, now_ms);
        flushed
    }

    /// Apply each `RankedDecision` resolution: emit the final journal
    /// entry and, for acceptances, start post-signal quality monitoring.
    pub fn resolve(&self, decisions: &[RankedDecision], now_ms: u64) {
        for decision in decisions {
            let Some((_, staged)) = self.staged.remove(&decision.decision_id) else {
                continue;
            };
            match decision.outcome {
                RankOutcome::Accepted => {
                    let mut entry = JournalEntry::new(
                        self.session_id,
                        decision.decision_id,
                        EntryType::Signal,
                        self.trading_mode,
                        staged.symbol.clone(),
                        DecisionOutcome::Accepted,
                        timestamp_to_utc_string(now_ms),
                        timestamp_to_utc_string(now_ms),
                    );
                    entry.blueprint = serde_json::to_value(serde_json::json!({
                        "direction": staged.direction.to_string(),
                        "entry": staged.blueprint.entry,
                        "stop": staged.blueprint.stop,
                        "target": staged.blueprint.target,
                    }))
                    .ok();
                    self.journal.record(entry);

                    self.quality_monitor.track(
                        decision.decision_id,
                        staged.symbol.clone(),
                        staged.direction,
                        &staged.snapshot,
                        now_ms,
                    );
                }
                RankOutcome::Rejected(reason) => {
                    self.emit(
                        decision.decision_id,
                        EntryType::Rejection,
                        &staged.symbol,
                        DecisionOutcome::Rejected,
                        Some(reason.to_string()),
                        now_ms,
                    );
                }
            }
        }
    }

    /// Manually (re-)start post-signal monitoring for a decision. `resolve`
    /// already calls this for every signal it accepts; exposed for callers
    /// replaying a journal or recovering a monitor after a restart.
    pub fn track_accepted(&self, symbol: &str, direction: Direction, decision_id: DecisionId, snapshot: &MetricSnapshot, now_ms: u64) {
        self.quality_monitor.track(decision_id, symbol.to_string(), direction, snapshot, now_ms);
    }

    /// Rechecks the tape-warmup watchlist; callers invoke this on the
    /// `tape_watchlist_recheck_interval_ms` cadence (§4.3 step 6).
    pub fn due_for_tape_recheck(&self, symbol: &str, now_ms: u64) -> bool {
        self.tape_watchlist
            .get(symbol)
            .map(|last| now_ms.saturating_sub(*last) >= self.config.tape_watchlist_recheck_interval_ms)
            .unwrap_or(false)
    }
}

/// Best-effort ms-since-epoch to RFC3339 conversion for journal entries.
/// `now_ms` is assumed to already be epoch-relative (the feed adapter's
/// `recv_ts`/`event_ts` clock), not a monotonic-since-boot clock.
fn timestamp_to_utc_string(now_ms: u64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_millis_opt(now_ms as i64)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::MarketDataConfig;
    use crate::core::types::fixed_point::from_f64;
    use crate::core::types::{DepthOp, DepthUpdate, RequestId, Side, TradePrint};
    use crate::journal::jsonl::JsonlFileJournal;
    use crate::subscription::feed::{FeedAdapter, SubscribeAck};
    use crate::subscription::triage::FocusConfig;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct AlwaysOkFeed;
    impl FeedAdapter for AlwaysOkFeed {
        fn subscribe(&self, _s: &str, include_depth: bool) -> Result<SubscribeAck, crate::core::errors::SubscriptionError> {
            Ok(SubscribeAck {
                mkt_data_id: RequestId(1),
                depth_id: if include_depth { Some(RequestId(2)) } else { None },
                primary_exchange: "NASDAQ".into(),
            })
        }
        fn unsubscribe(&self, _s: &str) -> Result<(), crate::core::errors::SubscriptionError> {
            Ok(())
        }
        fn enable_tick_by_tick(&self, _s: &str) -> Result<RequestId, crate::core::errors::SubscriptionError> {
            Ok(RequestId(3))
        }
        fn disable_tick_by_tick(&self, _s: &str) -> Result<(), crate::core::errors::SubscriptionError> {
            Ok(())
        }
        fn disable_depth(&self, _s: &str) -> Result<(), crate::core::errors::SubscriptionError> {
            Ok(())
        }
    }

    struct CollectingJournal(StdMutex<Vec<JournalEntry>>);
    impl JournalSink for CollectingJournal {
        fn record(&self, entry: JournalEntry) {
            self.0.lock().unwrap().push(entry);
        }
    }

    fn snapshot_for(symbol: &str, now_ms: u64) -> MetricSnapshot {
        MetricSnapshot {
            symbol: symbol.to_string(),
            timestamp_ms: now_ms,
            best_bid: Some(from_f64(262.00)),
            best_ask: Some(from_f64(262.02)),
            spread: Some(from_f64(0.02)),
            mid_price: Some(from_f64(262.01)),
            queue_imbalance: 0.9,
            bid_wall_age_ms: 5_000,
            ask_wall_age_ms: 1_000,
            bid_absorption_rate: 10.0,
            ask_absorption_rate: 0.0,
            tape_acceleration: 1.0,
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

    fn active_subscriptions(symbol: &str) -> MarketDataSubscriptionManager {
        let manager = MarketDataSubscriptionManager::new(
            Arc::new(AlwaysOkFeed),
            MarketDataConfig::default(),
            FocusConfig::default(),
        );
        let mut scores = HashMap::new();
        scores.insert(symbol.to_string(), 90.0);
        manager.apply_universe(&[symbol.to_string()], &scores, 0);
        manager
    }

    fn sample_book(symbol: &str) -> OrderBookState {
        let mut book = OrderBookState::new(symbol.to_string());
        book.apply_depth(DepthUpdate { side: Side::Bid, op: DepthOp::Insert, level: 0, price: from_f64(262.00), size: from_f64(50.0), event_ts_ms: 0, recv_ts_ms: 0 }).unwrap();
        book.apply_depth(DepthUpdate { side: Side::Ask, op: DepthOp::Insert, level: 0, price: from_f64(262.02), size: from_f64(50.0), event_ts_ms: 0, recv_ts_ms: 0 }).unwrap();
        book.record_trade(TradePrint { price: from_f64(262.01), size: from_f64(10.0), event_ts_ms: 500, recv_ts_ms: 500 });
        book
    }

    #[test]
    fn inactive_symbol_produces_no_journal_entry() {
        let manager = MarketDataSubscriptionManager::new(
            Arc::new(AlwaysOkFeed),
            MarketDataConfig::default(),
            FocusConfig::default(),
        );
        let journal = Arc::new(CollectingJournal(StdMutex::new(Vec::new())));
        let coordinator = ShadowTradingCoordinator::new(
            Arc::new(ScarcityController::new(crate::config::types::ScarcityConfig::default())),
            journal.clone(),
            ShadowTradingConfig::default(),
            TapeGateConfig::default(),
            SessionId::new(),
            TradingMode::Shadow,
        );
        let book = sample_book("AAPL");
        let snapshot = snapshot_for("AAPL", 1_000);
        coordinator.evaluate_snapshot(&book, &manager, &snapshot, 1_000);
        assert!(journal.0.lock().unwrap().is_empty());
    }

    #[test]
    fn scenario_s1_happy_buy_accepts() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Arc::new(JsonlFileJournal::new(dir.path().join("j.jsonl")).unwrap());
        let scarcity = Arc::new(ScarcityController::new(crate::config::types::ScarcityConfig {
            global_limit: 10,
            ..crate::config::types::ScarcityConfig::default()
        }));
        let coordinator = ShadowTradingCoordinator::new(
            scarcity,
            journal,
            ShadowTradingConfig::default(),
            TapeGateConfig { warmup_min_trades: 1, warmup_window_ms: 60_000, stale_window_ms: 60_000 },
            SessionId::new(),
            TradingMode::Shadow,
        );
        let manager = active_subscriptions("AAPL");
        let book = sample_book("AAPL");
        let snapshot = snapshot_for("AAPL", 1_000);
        let flushed = coordinator.evaluate_snapshot(&book, &manager, &snapshot, 1_000);
        // Window hasn't closed yet on this call; that's fine, this just
        // exercises that the pipeline reaches scarcity staging without
        // panicking and without being rejected earlier.
        let _ = flushed;
    }
}
