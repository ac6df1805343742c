//! Default-value functions for `#[serde(default = "...")]` fields, kept
//! separate from the type definitions so the struct bodies stay readable.

pub fn default_max_lines() -> u32 {
    95
}
pub fn default_max_depth_symbols() -> u32 {
    3
}
pub fn default_tick_by_tick_max_symbols() -> u32 {
    6
}
pub fn default_min_hold_minutes() -> u32 {
    5
}
pub fn default_true() -> bool {
    true
}

pub fn default_max_active_symbols() -> u32 {
    50
}

pub fn default_focus_min_dwell_ms() -> u64 {
    120_000
}
pub fn default_focus_tape_idle_ms() -> u64 {
    30_000
}
pub fn default_focus_depth_idle_ms() -> u64 {
    30_000
}
pub fn default_focus_warmup_min_trades() -> u32 {
    3
}
pub fn default_min_score_delta_to_swap() -> f64 {
    15.0
}

pub fn default_tape_warmup_min_trades() -> u32 {
    5
}
pub fn default_tape_warmup_window_ms() -> u64 {
    10_000
}
pub fn default_tape_stale_window_ms() -> u64 {
    5_000
}

pub fn default_post_signal_monitoring_enabled() -> bool {
    true
}
pub fn default_tape_slowdown_threshold() -> f64 {
    0.5
}
pub fn default_spread_blowout_threshold() -> f64 {
    0.5
}
pub fn default_tape_watchlist_enabled() -> bool {
    true
}
pub fn default_tape_watchlist_recheck_interval_ms() -> u64 {
    5_000
}
pub fn default_signal_evaluation_throttle_ms() -> u64 {
    250
}

pub fn default_rank_window_ms() -> u64 {
    250
}
pub fn default_global_limit() -> u32 {
    3
}
pub fn default_global_window_ms() -> u64 {
    3_600_000
}
pub fn default_symbol_limit() -> u32 {
    1
}
pub fn default_symbol_cooldown_ms() -> u64 {
    600_000
}

pub fn default_broker_port() -> u16 {
    7497
}
pub fn default_broker_client_id() -> i32 {
    1
}
pub fn default_disconnect_threshold_seconds() -> u64 {
    30
}
pub fn default_disconnect_check_interval_seconds() -> u64 {
    10
}

pub fn default_prometheus_port() -> u16 {
    9090
}
pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_metrics_addr() -> String {
    "127.0.0.1:9090".to_string()
}
pub fn default_metrics_path() -> String {
    "/metrics".to_string()
}
pub fn default_journal_path() -> String {
    "journal.jsonl".to_string()
}

pub fn default_depth_ineligible_cooldown_ms() -> u64 {
    24 * 60 * 60 * 1000
}
pub fn default_tick_by_tick_cap_cooldown_ms() -> u64 {
    30 * 60 * 1000
}
