// Subscription reconcile benchmarks: `apply_universe` runs under a single
// mutex on the orchestrator's timer, so its cost scales with the universe
// size that the broker's line budget will ever realistically see.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shadow_core::core::errors::SubscriptionError;
use shadow_core::core::types::{RequestId, Symbol};
use shadow_core::subscription::feed::{FeedAdapter, SubscribeAck};
use shadow_core::subscription::triage::FocusConfig;
use shadow_core::subscription::MarketDataSubscriptionManager;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct StubFeed {
    next_id: AtomicU64,
}

impl StubFeed {
    fn new() -> Self {
        Self { next_id: AtomicU64::new(1) }
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

fn universe(n: usize) -> (Vec<Symbol>, HashMap<Symbol, f64>) {
    let symbols: Vec<Symbol> = (0..n).map(|i| format!("SYM{:04}", i)).collect();
    let scores: HashMap<Symbol, f64> = symbols
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), 50.0 + (i % 50) as f64))
        .collect();
    (symbols, scores)
}

fn bench_apply_universe(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscription_apply_universe");
    group.measurement_time(Duration::from_secs(2));

    for &size in &[10usize, 50, 95] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let manager = MarketDataSubscriptionManager::new(
                Arc::new(StubFeed::new()),
                shadow_core::config::types::MarketDataConfig {
                    max_lines: 95,
                    max_depth_symbols: 3,
                    ..shadow_core::config::types::MarketDataConfig::default()
                },
                FocusConfig::default(),
            );
            let (symbols, scores) = universe(size);
            let mut ts = 0u64;
            b.iter(|| {
                ts += 60_000;
                black_box(manager.apply_universe(&symbols, &scores, ts));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_apply_universe);
criterion_main!(benches);
