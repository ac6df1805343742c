// Order book benchmarks: depth application and snapshot production are on
// the feed-ingest hot path, so both need to stay allocation-free and fast.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shadow_core::core::types::fixed_point::from_f64;
use shadow_core::core::types::{DepthOp, DepthUpdate, Side, TradePrint};
use shadow_core::metrics::OrderFlowMetrics;
use shadow_core::orderbook::OrderBookState;
use std::time::Duration;

fn depth(side: Side, op: DepthOp, level: usize, price: f64, size: f64, ts: u64) -> DepthUpdate {
    DepthUpdate {
        side,
        op,
        level,
        price: from_f64(price),
        size: from_f64(size),
        event_ts_ms: ts,
        recv_ts_ms: ts,
    }
}

fn seeded_book() -> OrderBookState {
    let mut book = OrderBookState::new("AAPL".to_string());
    for level in 0..10 {
        book.apply_depth(depth(Side::Bid, DepthOp::Insert, level, 262.00 - level as f64 * 0.01, 50.0, 1000))
            .unwrap();
        book.apply_depth(depth(Side::Ask, DepthOp::Insert, level, 262.02 + level as f64 * 0.01, 50.0, 1000))
            .unwrap();
    }
    book
}

fn bench_apply_depth_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_apply_depth");
    group.measurement_time(Duration::from_secs(2));

    group.bench_function("update_existing_level", |b| {
        let mut book = seeded_book();
        let mut ts = 2000u64;
        b.iter(|| {
            ts += 1;
            black_box(book.apply_depth(depth(Side::Bid, DepthOp::Update, 0, 262.00, 55.0, ts)).ok());
        })
    });

    group.bench_function("insert_then_delete", |b| {
        let mut book = seeded_book();
        let mut ts = 2000u64;
        b.iter(|| {
            ts += 1;
            book.apply_depth(depth(Side::Bid, DepthOp::Insert, 9, 261.90, 20.0, ts)).ok();
            ts += 1;
            black_box(book.apply_depth(depth(Side::Bid, DepthOp::Delete, 9, 0.0, 0.0, ts)).ok());
        })
    });

    group.finish();
}

fn bench_record_trade(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_record_trade");
    group.measurement_time(Duration::from_secs(2));

    group.bench_function("record_trade_at_best_bid", |b| {
        let mut book = seeded_book();
        let mut ts = 2000u64;
        b.iter(|| {
            ts += 1;
            book.record_trade(black_box(TradePrint {
                price: from_f64(262.00),
                size: from_f64(5.0),
                event_ts_ms: ts,
                recv_ts_ms: ts,
            }));
        })
    });

    group.finish();
}

fn bench_produce_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_produce_snapshot");
    group.measurement_time(Duration::from_secs(2));

    group.bench_function("produce_snapshot_monotonic", |b| {
        let book = seeded_book();
        let metrics = OrderFlowMetrics::new();
        let mut ts = 2000u64;
        b.iter(|| {
            ts += 1;
            black_box(metrics.produce_snapshot(&book, ts));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_apply_depth_update, bench_record_trade, bench_produce_snapshot);
criterion_main!(benches);
