//! Replay validator: drives the core pipeline over a captured depth+tape
//! JSONL sequence and checks the determinism and book-integrity invariants
//! required of a replayable feature extractor.
//!
//! Exit code `0` on `ReplayPass=true` (invalid-book-seconds < 5%, zero
//! book-integrity exceptions, zero crossed seconds); `1` otherwise. A
//! narrow binary with its own `clap::Parser` args, no shared `main`
//! scaffolding with the session orchestrator.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{error, info, warn};

use shadow_core::core::types::{DepthUpdate, Symbol, TradePrint};
use shadow_core::metrics::{MetricSnapshot, OrderFlowMetrics};
use shadow_core::orderbook::OrderBookState;
use shadow_core::utils::init_logger;

/// 5% ceiling on the fraction of wall-clock seconds the book may spend
/// invalid before a replay run is rejected (§6).
const MAX_INVALID_BOOK_FRACTION: f64 = 0.05;

/// >5% best-bid/ask jump within one second without an intervening tape
/// print makes the feed suspect (§4.1).
const SUSPECT_JUMP_FRACTION: f64 = 0.05;

#[derive(Parser, Debug)]
#[command(author, version, about = "Shadow Trading Signal Engine replay validator")]
struct Args {
    /// Path to a captured depth+tape event sequence, one JSON object per
    /// line, ordered by `recv_ts_ms` (ties broken depth-before-tape).
    #[arg(long)]
    input: PathBuf,

    /// Override `metrics.log_level`.
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(long)]
    json_logs: bool,
}

/// One line of the captured sequence. Untagged depth-vs-tape dispatch is
/// avoided in favor of an explicit tag so malformed captures fail loudly
/// instead of silently matching the wrong variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CapturedEvent {
    Depth {
        symbol: Symbol,
        #[serde(flatten)]
        update: DepthUpdate,
    },
    Trade {
        symbol: Symbol,
        #[serde(flatten)]
        print: TradePrint,
    },
}

impl CapturedEvent {
    fn recv_ts_ms(&self) -> u64 {
        match self {
            CapturedEvent::Depth { update, .. } => update.recv_ts_ms,
            CapturedEvent::Trade { print, .. } => print.recv_ts_ms,
        }
    }

    /// Depth sorts before tape on an equal timestamp (§2, §8 invariant ordering).
    fn tie_break_rank(&self) -> u8 {
        match self {
            CapturedEvent::Depth { .. } => 0,
            CapturedEvent::Trade { .. } => 1,
        }
    }
}

fn load_events(path: &PathBuf) -> Result<Vec<CapturedEvent>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {} of {}", line_no + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: CapturedEvent = serde_json::from_str(&line)
            .with_context(|| format!("parsing line {} of {}", line_no + 1, path.display()))?;
        events.push(event);
    }
    // Stable sort preserves file order among events at the same timestamp
    // past the explicit depth-before-tape tie-break.
    events.sort_by_key(|e| (e.recv_ts_ms(), e.tie_break_rank()));
    Ok(events)
}

/// Outcome of a single pass over the captured sequence.
struct ReplayRun {
    snapshots: Vec<MetricSnapshot>,
    invalid_book_seconds: u64,
    total_seconds: u64,
    crossed_seconds: u64,
    exceptions: u64,
    suspect_jumps: u64,
}

/// Replay the full sequence once, producing a `MetricSnapshot` after every
/// event and accumulating the book-integrity counters the pass/fail
/// decision is built from.
fn run_once(events: &[CapturedEvent]) -> ReplayRun {
    let mut books: HashMap<Symbol, OrderBookState> = HashMap::new();
    let metrics = OrderFlowMetrics::new();

    let mut snapshots = Vec::with_capacity(events.len());
    let mut invalid_seconds: std::collections::HashSet<u64> = std::collections::HashSet::new();
    let mut crossed_seconds: std::collections::HashSet<u64> = std::collections::HashSet::new();
    let mut exceptions: u64 = 0;
    let mut suspect_jumps: u64 = 0;

    // Per-symbol state for the >5%-jump-without-a-print check: last mid
    // price and whether a trade print landed in the current second.
    let mut last_mid: HashMap<Symbol, (u64, i64)> = HashMap::new();
    let mut prints_this_second: HashMap<(Symbol, u64), bool> = HashMap::new();

    let mut min_ts = u64::MAX;
    let mut max_ts = 0u64;

    for event in events {
        match event {
            CapturedEvent::Depth { symbol, update } => {
                let ts = update.recv_ts_ms;
                min_ts = min_ts.min(ts);
                max_ts = max_ts.max(ts);
                let book = books.entry(symbol.clone()).or_insert_with(|| OrderBookState::new(symbol.clone()));

                match book.apply_depth(*update) {
                    Ok(()) => {}
                    Err(err) => {
                        exceptions += 1;
                        warn!(symbol = %symbol, error = %err, "replay: depth update rejected");
                    }
                }

                let second = ts / 1_000;
                if book.is_book_valid(ts).is_err() {
                    invalid_seconds.insert(second);
                }
                if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                    if bid >= ask {
                        crossed_seconds.insert(second);
                    }
                }

                if let Some(mid) = book.mid_price() {
                    let had_print = prints_this_second.get(&(symbol.clone(), second)).copied().unwrap_or(false);
                    if let Some((prev_second, prev_mid)) = last_mid.get(symbol).copied() {
                        if prev_second == second && prev_mid > 0 && !had_print {
                            let delta = (mid - prev_mid).abs() as f64 / prev_mid as f64;
                            if delta > SUSPECT_JUMP_FRACTION {
                                suspect_jumps += 1;
                                warn!(symbol = %symbol, delta = delta, "replay: unexplained price jump without a tape print");
                            }
                        }
                    }
                    last_mid.insert(symbol.clone(), (second, mid));
                }

                if let Some(snap) = metrics.produce_snapshot(book, ts) {
                    snapshots.push(snap);
                }
            }
            CapturedEvent::Trade { symbol, print } => {
                let ts = print.recv_ts_ms;
                min_ts = min_ts.min(ts);
                max_ts = max_ts.max(ts);
                let book = books.entry(symbol.clone()).or_insert_with(|| OrderBookState::new(symbol.clone()));
                book.record_trade(*print);
                prints_this_second.insert((symbol.clone(), ts / 1_000), true);

                if let Some(snap) = metrics.produce_snapshot(book, ts) {
                    snapshots.push(snap);
                }
            }
        }
    }

    let total_seconds = if min_ts <= max_ts { (max_ts - min_ts) / 1_000 + 1 } else { 0 };

    ReplayRun {
        snapshots,
        invalid_book_seconds: invalid_seconds.len() as u64,
        total_seconds,
        crossed_seconds: crossed_seconds.len() as u64,
        exceptions,
        suspect_jumps,
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logger(&args.log_level, args.json_logs);

    let events = load_events(&args.input)?;
    if events.is_empty() {
        error!("replay input {} contained no events", args.input.display());
        return Ok(ExitCode::FAILURE);
    }
    info!(events = events.len(), input = %args.input.display(), "replay: loaded captured sequence");

    let first = run_once(&events);
    let second = run_once(&events);

    let deterministic = first.snapshots == second.snapshots;
    if !deterministic {
        let divergence = first
            .snapshots
            .iter()
            .zip(second.snapshots.iter())
            .position(|(a, b)| a != b);
        error!(?divergence, "replay: two passes over the same input produced different snapshot sequences");
    }

    let invalid_fraction = if first.total_seconds > 0 {
        first.invalid_book_seconds as f64 / first.total_seconds as f64
    } else {
        0.0
    };

    info!(
        total_seconds = first.total_seconds,
        invalid_book_seconds = first.invalid_book_seconds,
        invalid_fraction = invalid_fraction,
        crossed_seconds = first.crossed_seconds,
        exceptions = first.exceptions,
        suspect_jumps = first.suspect_jumps,
        deterministic,
        "replay: pass complete"
    );

    let replay_pass = deterministic
        && invalid_fraction < MAX_INVALID_BOOK_FRACTION
        && first.exceptions == 0
        && first.crossed_seconds == 0
        && first.suspect_jumps == 0;

    if replay_pass {
        info!("replay: PASS");
        Ok(ExitCode::SUCCESS)
    } else {
        error!("replay: FAIL");
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_core::core::types::fixed_point::from_f64;
    use shadow_core::core::types::{DepthOp, Side};

    fn depth_line(symbol: &str, side: Side, op: DepthOp, level: usize, price: f64, size: f64, ts: u64) -> CapturedEvent {
        CapturedEvent::Depth {
            symbol: symbol.to_string(),
            update: DepthUpdate {
                side,
                op,
                level,
                price: from_f64(price),
                size: from_f64(size),
                event_ts_ms: ts,
                recv_ts_ms: ts,
            },
        }
    }

    fn trade_line(symbol: &str, price: f64, size: f64, ts: u64) -> CapturedEvent {
        CapturedEvent::Trade {
            symbol: symbol.to_string(),
            print: TradePrint {
                price: from_f64(price),
                size: from_f64(size),
                event_ts_ms: ts,
                recv_ts_ms: ts,
            },
        }
    }

    fn clean_sequence() -> Vec<CapturedEvent> {
        vec![
            depth_line("AAPL", Side::Bid, DepthOp::Insert, 0, 262.00, 50.0, 1_000),
            depth_line("AAPL", Side::Ask, DepthOp::Insert, 0, 262.02, 50.0, 1_000),
            trade_line("AAPL", 262.01, 5.0, 1_500),
            depth_line("AAPL", Side::Bid, DepthOp::Update, 0, 262.00, 45.0, 2_000),
        ]
    }

    #[test]
    fn clean_sequence_is_deterministic_and_valid() {
        let events = clean_sequence();
        let first = run_once(&events);
        let second = run_once(&events);
        assert_eq!(first.snapshots, second.snapshots);
        assert_eq!(first.exceptions, 0);
        assert_eq!(first.crossed_seconds, 0);
    }

    #[test]
    fn ties_break_depth_before_tape() {
        let mut events = vec![
            trade_line("AAPL", 100.0, 1.0, 1_000),
            depth_line("AAPL", Side::Bid, DepthOp::Insert, 0, 99.0, 10.0, 1_000),
        ];
        events.sort_by_key(|e| (e.recv_ts_ms(), e.tie_break_rank()));
        assert!(matches!(events[0], CapturedEvent::Depth { .. }));
        assert!(matches!(events[1], CapturedEvent::Trade { .. }));
    }

    #[test]
    fn empty_book_never_counts_as_crossed() {
        let events = vec![depth_line("AAPL", Side::Bid, DepthOp::Insert, 0, 262.00, 50.0, 1_000)];
        let run = run_once(&events);
        assert_eq!(run.crossed_seconds, 0);
        assert_eq!(run.invalid_book_seconds, 1);
    }
}
