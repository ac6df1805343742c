// Decision-pipeline benchmark: `evaluate_snapshot` runs once per fresh
// `MetricSnapshot` per active symbol, so its per-call cost sets the floor on
// how many symbols one decision-pipeline thread can keep up with.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shadow_core::config::types::{MarketDataConfig, ScarcityConfig, ShadowTradingConfig, TapeGateConfig};
use shadow_core::core::errors::SubscriptionError;
use shadow_core::core::types::fixed_point::from_f64;
use shadow_core::core::types::{DepthOp, DepthUpdate, RequestId, SessionId, Side, TradingMode};
use shadow_core::journal::NullJournal;
use shadow_core::metrics::MetricSnapshot;
use shadow_core::orderbook::OrderBookState;
use shadow_core::scarcity::ScarcityController;
use shadow_core::subscription::feed::{FeedAdapter, SubscribeAck};
use shadow_core::subscription::triage::FocusConfig;
use shadow_core::subscription::MarketDataSubscriptionManager;
use shadow_core::ShadowTradingCoordinator;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct AlwaysOkFeed;
impl FeedAdapter for AlwaysOkFeed {
    fn subscribe(&self, _symbol: &str, include_depth: bool) -> Result<SubscribeAck, SubscriptionError> {
        Ok(SubscribeAck {
            mkt_data_id: RequestId(1),
            depth_id: if include_depth { Some(RequestId(2)) } else { None },
            primary_exchange: "NASDAQ".to_string(),
        })
    }
    fn unsubscribe(&self, _symbol: &str) -> Result<(), SubscriptionError> {
        Ok(())
    }
    fn enable_tick_by_tick(&self, _symbol: &str) -> Result<RequestId, SubscriptionError> {
        Ok(RequestId(3))
    }
    fn disable_tick_by_tick(&self, _symbol: &str) -> Result<(), SubscriptionError> {
        Ok(())
    }
    fn disable_depth(&self, _symbol: &str) -> Result<(), SubscriptionError> {
        Ok(())
    }
}

fn active_subscriptions(symbol: &str) -> MarketDataSubscriptionManager {
    let manager = MarketDataSubscriptionManager::new(Arc::new(AlwaysOkFeed), MarketDataConfig::default(), FocusConfig::default());
    let mut scores = HashMap::new();
    scores.insert(symbol.to_string(), 90.0);
    manager.apply_universe(&[symbol.to_string()], &scores, 0);
    manager
}

fn sample_book(symbol: &str) -> OrderBookState {
    let mut book = OrderBookState::new(symbol.to_string());
    book.apply_depth(DepthUpdate { side: Side::Bid, op: DepthOp::Insert, level: 0, price: from_f64(262.00), size: from_f64(50.0), event_ts_ms: 0, recv_ts_ms: 0 }).unwrap();
    book.apply_depth(DepthUpdate { side: Side::Ask, op: DepthOp::Insert, level: 0, price: from_f64(262.02), size: from_f64(50.0), event_ts_ms: 0, recv_ts_ms: 0 }).unwrap();
    book
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

fn bench_evaluate_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator_evaluate_snapshot");
    group.measurement_time(Duration::from_secs(2));

    group.bench_function("happy_path_throttled_repeat", |b| {
        let scarcity = Arc::new(ScarcityController::new(ScarcityConfig { global_limit: 1_000_000, ..ScarcityConfig::default() }));
        let coordinator = ShadowTradingCoordinator::new(
            scarcity,
            Arc::new(NullJournal),
            ShadowTradingConfig::default(),
            TapeGateConfig { warmup_min_trades: 1, warmup_window_ms: 60_000, stale_window_ms: 60_000 },
            SessionId::new(),
            TradingMode::Shadow,
        );
        let manager = active_subscriptions("AAPL");
        let book = sample_book("AAPL");
        let mut ts = 1_000u64;
        b.iter(|| {
            ts += 1;
            let snapshot = snapshot_for("AAPL", ts);
            black_box(coordinator.evaluate_snapshot(&book, &manager, &snapshot, ts));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_evaluate_snapshot);
criterion_main!(benches);
