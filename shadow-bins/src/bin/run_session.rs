//! Shadow Trading Signal Engine - session orchestrator.
//!
//! Wires the subscription manager, decision pipeline, scarcity controller,
//! journal, and Prometheus registry together and drives them against a
//! synthetic tick generator.
//!
//! NOTE: the broker wire protocol is an external collaborator out of scope
//! for this crate. `SyntheticFeed` below stands in for a real broker
//! session the way a deterministic sinusoidal price walk stands in for a
//! live exchange feed in paper-trading demos: replace it with a real
//! `FeedAdapter` implementation to go live.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use shadow_bins::common::{install_ctrlc_handler, CommonArgs};
use shadow_core::config::Config;
use shadow_core::core::types::fixed_point::from_f64;
use shadow_core::core::types::{DepthOp, DepthUpdate, RequestId, Side, SessionId, TradePrint, TradingMode};
use shadow_core::core::errors::SubscriptionError;
use shadow_core::coordinator::ShadowTradingCoordinator;
use shadow_core::journal::jsonl::JsonlFileJournal;
use shadow_core::journal::JournalSink;
use shadow_core::metrics::OrderFlowMetrics;
use shadow_core::monitoring::server::{MetricsServer, MetricsServerConfig};
use shadow_core::monitoring::MetricsRegistry;
use shadow_core::orderbook::OrderBookState;
use shadow_core::resilience::{ConnectionHealthMonitor, ExponentialBackoff, ShutdownToken};
use shadow_core::scarcity::ScarcityController;
use shadow_core::subscription::feed::{FeedAdapter, SubscribeAck};
use shadow_core::subscription::MarketDataSubscriptionManager;

#[derive(Parser, Debug)]
#[command(author, version, about = "Shadow Trading Signal Engine")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Comma-separated symbol universe to trade (overrides a fixed demo list).
    #[arg(long, default_value = "AAPL,MSFT,NVDA")]
    universe: String,

    /// Number of synthetic ticks to run before exiting (absent a real feed).
    #[arg(long, default_value_t = 20_000)]
    ticks: u64,
}

/// Stands in for a broker session. Every call succeeds and hands back a
/// locally-minted request id; there is no real subscription budget here,
/// the `MarketDataSubscriptionManager` enforces its own independently.
struct SyntheticFeed {
    next_id: AtomicU64,
}

impl SyntheticFeed {
    fn new() -> Self {
        Self { next_id: AtomicU64::new(1) }
    }
    fn id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl FeedAdapter for SyntheticFeed {
    fn subscribe(&self, symbol: &str, include_depth: bool) -> Result<SubscribeAck, SubscriptionError> {
        info!(symbol, include_depth, "feed: subscribe");
        Ok(SubscribeAck {
            mkt_data_id: self.id(),
            depth_id: if include_depth { Some(self.id()) } else { None },
            primary_exchange: "NASDAQ".to_string(),
        })
    }
    fn unsubscribe(&self, symbol: &str) -> Result<(), SubscriptionError> {
        info!(symbol, "feed: unsubscribe");
        Ok(())
    }
    fn enable_tick_by_tick(&self, symbol: &str) -> Result<RequestId, SubscriptionError> {
        info!(symbol, "feed: enable tick-by-tick");
        Ok(self.id())
    }
    fn disable_tick_by_tick(&self, symbol: &str) -> Result<(), SubscriptionError> {
        info!(symbol, "feed: disable tick-by-tick");
        Ok(())
    }
    fn disable_depth(&self, symbol: &str) -> Result<(), SubscriptionError> {
        info!(symbol, "feed: disable depth");
        Ok(())
    }
}

/// Deterministic synthetic depth/tape generator, one per symbol, advancing
/// its own mid price with a small sinusoidal drift.
struct SymbolGenerator {
    mid: f64,
    tick: u64,
}

impl SymbolGenerator {
    fn new(seed: f64) -> Self {
        Self { mid: seed, tick: 0 }
    }

    fn next_events(&mut self, now_ms: u64) -> (DepthUpdate, DepthUpdate, Option<TradePrint>) {
        self.tick += 1;
        self.mid += (self.tick as f64 * 0.05).sin() * 0.01;
        let bid = self.mid - 0.01;
        let ask = self.mid + 0.01;

        let bid_update = DepthUpdate {
            side: Side::Bid,
            op: DepthOp::Update,
            level: 0,
            price: from_f64(bid),
            size: from_f64(50.0 + (self.tick % 20) as f64),
            event_ts_ms: now_ms,
            recv_ts_ms: now_ms,
        };
        let ask_update = DepthUpdate {
            side: Side::Ask,
            op: DepthOp::Update,
            level: 0,
            price: from_f64(ask),
            size: from_f64(50.0 + (self.tick % 15) as f64),
            event_ts_ms: now_ms,
            recv_ts_ms: now_ms,
        };
        let trade = if self.tick % 7 == 0 {
            Some(TradePrint {
                price: from_f64(ask),
                size: from_f64(3.0),
                event_ts_ms: now_ms,
                recv_ts_ms: now_ms,
            })
        } else {
            None
        };
        (bid_update, ask_update, trade)
    }
}

fn triage_score(book: &OrderBookState, now_ms: u64) -> f64 {
    // Cheap stand-in for a real ranking model: reward tight, fresh spreads.
    let freshness = 1.0 / (1.0 + now_ms.saturating_sub(book.last_depth_update_ms()) as f64 / 1000.0);
    match book.spread() {
        Some(spread) if spread > 0 => freshness * 100.0 / shadow_core::core::types::fixed_point::to_f64(spread).max(0.01),
        _ => 0.0,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config: Config = shadow_core::config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config))?;

    let log_level = args.common.log_level.clone().unwrap_or_else(|| config.metrics.log_level.clone());
    let json_logs = args.common.json_logs || config.metrics.json_logs;
    shadow_core::utils::init_logger(&log_level, json_logs);

    info!("=== Shadow Trading Signal Engine ===");
    info!(mode = %config.trading_mode.0, "trading mode");

    let shutdown = ShutdownToken::new();
    install_ctrlc_handler(shutdown.clone())?;

    let registry = Arc::new(MetricsRegistry::new().context("failed to build metrics registry")?);

    let rt = if config.monitoring.enable_prometheus {
        let rt = tokio::runtime::Runtime::new().context("failed to build tokio runtime for metrics server")?;
        let server_config = MetricsServerConfig {
            listen_addr: config
                .monitoring
                .metrics_addr
                .parse()
                .context("invalid monitoring.metrics_addr")?,
            metrics_path: config.monitoring.metrics_path.clone(),
        };
        let server = MetricsServer::new(server_config, registry.clone());
        rt.spawn(async move {
            if let Err(e) = server.serve().await {
                warn!(error = %e, "metrics server exited");
            }
        });
        Some(rt)
    } else {
        None
    };

    let journal: Arc<dyn JournalSink> = if config.monitoring.enable_journal {
        Arc::new(JsonlFileJournal::new(PathBuf::from(&config.monitoring.journal_path)).context("opening journal file")?)
    } else {
        Arc::new(shadow_core::journal::NullJournal)
    };

    let feed = Arc::new(SyntheticFeed::new());
    let subscriptions = Arc::new(MarketDataSubscriptionManager::new(
        feed,
        config.market_data.clone(),
        config.focus.clone(),
    ));
    let scarcity = Arc::new(ScarcityController::new(config.scarcity.clone()));
    let coordinator = ShadowTradingCoordinator::new(
        scarcity.clone(),
        journal.clone(),
        config.shadow_trading.clone(),
        config.tape_gate.clone(),
        SessionId::new(),
        config.trading_mode.0,
    );

    let health = ConnectionHealthMonitor::new(&config.broker, 0);
    let mut backoff = ExponentialBackoff::new();

    let universe: Vec<String> = args.universe.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    let mut books: HashMap<String, OrderBookState> = universe.iter().map(|s| (s.clone(), OrderBookState::new(s.clone()))).collect();
    let mut generators: HashMap<String, SymbolGenerator> = universe
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), SymbolGenerator::new(100.0 + i as f64 * 50.0)))
        .collect();

    const RECONCILE_EVERY_MS: u64 = 60_000;
    const SCARCITY_FLUSH_EVERY_MS: u64 = 250;
    const HEALTH_CHECK_EVERY_MS: u64 = 10_000;
    const METRICS_REFRESH_EVERY_MS: u64 = 1_000;

    let start = Instant::now();
    let mut now_ms: u64 = 0;
    let mut last_reconcile_ms = 0u64;
    let mut last_health_check_ms = 0u64;
    let mut last_metrics_refresh_ms = 0u64;

    info!(universe = ?universe, "starting synthetic session");

    let metrics = OrderFlowMetrics::new();
    for _ in 0..args.ticks {
        if shutdown.should_stop() {
            info!(reason = ?shutdown.reason(), "shutdown requested, draining");
            break;
        }
        now_ms += 10;

        for symbol in &universe {
            let generator = generators.get_mut(symbol).expect("generator seeded for every universe symbol");
            let (bid, ask, trade) = generator.next_events(now_ms);
            let book = books.get_mut(symbol).expect("book seeded for every universe symbol");

            if book.apply_depth(bid).is_ok() {
                subscriptions.record_depth_receipt(symbol, now_ms);
                health.record_tick(now_ms);
            }
            if book.apply_depth(ask).is_ok() {
                subscriptions.record_depth_receipt(symbol, now_ms);
            }
            if let Some(trade) = trade {
                book.record_trade(trade);
                subscriptions.record_tape_receipt(symbol, now_ms);
            }
        }

        if now_ms.saturating_sub(last_reconcile_ms) >= RECONCILE_EVERY_MS || last_reconcile_ms == 0 {
            let scores: HashMap<String, f64> = universe
                .iter()
                .map(|s| (s.clone(), triage_score(&books[s], now_ms)))
                .collect();
            subscriptions.apply_universe(&universe, &scores, now_ms);
            last_reconcile_ms = now_ms;
        }

        for symbol in &universe {
            if !subscriptions.is_active(symbol) {
                continue;
            }
            let book = &books[symbol];
            if let Some(snapshot) = metrics.produce_snapshot(book, now_ms) {
                registry.coordinator().snapshots_processed_total.inc();
                coordinator.evaluate_snapshot(book, &subscriptions, &snapshot, now_ms);
            }
        }

        if now_ms.saturating_sub(last_reconcile_ms) >= SCARCITY_FLUSH_EVERY_MS {
            let flushed = scarcity.flush_rank_window(now_ms);
            if !flushed.is_empty() {
                coordinator.resolve(&flushed, now_ms);
            }
        }

        if health.due_for_check(last_health_check_ms, now_ms) {
            if health.is_stalled(now_ms) {
                registry.system().feed_connected.set(0);
                if let Some(delay) = backoff.next_delay() {
                    warn!(attempt = backoff.attempt_number(), ?delay, "feed stalled, backing off before reconnect");
                }
            } else {
                registry.system().feed_connected.set(1);
                backoff.reset();
            }
            last_health_check_ms = now_ms;
        }

        if now_ms.saturating_sub(last_metrics_refresh_ms) >= METRICS_REFRESH_EVERY_MS {
            registry.subscription().lines_in_use.set(subscriptions.total_lines() as i64);
            registry.subscription().depth_cap_utilization.set(subscriptions.depth_enabled_count() as i64);
            registry.subscription().cooldowns_active.set(subscriptions.cooldowns_active_count(now_ms) as i64);
            registry.system().uptime_seconds.set(start.elapsed().as_secs() as i64);
            last_metrics_refresh_ms = now_ms;
        }
    }

    drop(journal);
    info!("journal drained, session exiting");
    drop(rt);
    Ok(())
}
