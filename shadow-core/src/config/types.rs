//! The configuration tree, loaded once at process start and treated as
//! immutable for the session (§4.6, §9 "Dynamic config"): a reconfigure is
//! a restart, not a live-reload path.

use serde::{Deserialize, Serialize};

use crate::core::types::TradingMode;
use crate::subscription::triage::FocusConfig;

use super::defaults;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default = "defaults::default_max_lines")]
    pub max_lines: u32,
    #[serde(default = "defaults::default_max_depth_symbols")]
    pub max_depth_symbols: u32,
    #[serde(default = "defaults::default_tick_by_tick_max_symbols")]
    pub tick_by_tick_max_symbols: u32,
    #[serde(default = "defaults::default_min_hold_minutes")]
    pub min_hold_minutes: u32,
    #[serde(default = "defaults::default_true")]
    pub enable_depth: bool,
    #[serde(default = "defaults::default_true")]
    pub enable_tape: bool,
    #[serde(default = "defaults::default_depth_ineligible_cooldown_ms")]
    pub depth_ineligible_cooldown_ms: u64,
    #[serde(default = "defaults::default_tick_by_tick_cap_cooldown_ms")]
    pub tick_by_tick_cap_cooldown_ms: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            max_lines: defaults::default_max_lines(),
            max_depth_symbols: defaults::default_max_depth_symbols(),
            tick_by_tick_max_symbols: defaults::default_tick_by_tick_max_symbols(),
            min_hold_minutes: defaults::default_min_hold_minutes(),
            enable_depth: true,
            enable_tape: true,
            depth_ineligible_cooldown_ms: defaults::default_depth_ineligible_cooldown_ms(),
            tick_by_tick_cap_cooldown_ms: defaults::default_tick_by_tick_cap_cooldown_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    #[serde(default = "defaults::default_max_active_symbols")]
    pub max_active_symbols: u32,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            max_active_symbols: defaults::default_max_active_symbols(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapeGateConfig {
    #[serde(default = "defaults::default_tape_warmup_min_trades")]
    pub warmup_min_trades: u32,
    #[serde(default = "defaults::default_tape_warmup_window_ms")]
    pub warmup_window_ms: u64,
    #[serde(default = "defaults::default_tape_stale_window_ms")]
    pub stale_window_ms: u64,
}

impl Default for TapeGateConfig {
    fn default() -> Self {
        Self {
            warmup_min_trades: defaults::default_tape_warmup_min_trades(),
            warmup_window_ms: defaults::default_tape_warmup_window_ms(),
            stale_window_ms: defaults::default_tape_stale_window_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowTradingConfig {
    #[serde(default = "defaults::default_post_signal_monitoring_enabled")]
    pub post_signal_monitoring_enabled: bool,
    #[serde(default = "defaults::default_tape_slowdown_threshold")]
    pub tape_slowdown_threshold: f64,
    #[serde(default = "defaults::default_spread_blowout_threshold")]
    pub spread_blowout_threshold: f64,
    #[serde(default = "defaults::default_tape_watchlist_enabled")]
    pub tape_watchlist_enabled: bool,
    #[serde(default = "defaults::default_tape_watchlist_recheck_interval_ms")]
    pub tape_watchlist_recheck_interval_ms: u64,
    #[serde(default = "defaults::default_signal_evaluation_throttle_ms")]
    pub signal_evaluation_throttle_ms: u64,
}

impl Default for ShadowTradingConfig {
    fn default() -> Self {
        Self {
            post_signal_monitoring_enabled: true,
            tape_slowdown_threshold: defaults::default_tape_slowdown_threshold(),
            spread_blowout_threshold: defaults::default_spread_blowout_threshold(),
            tape_watchlist_enabled: true,
            tape_watchlist_recheck_interval_ms: defaults::default_tape_watchlist_recheck_interval_ms(),
            signal_evaluation_throttle_ms: defaults::default_signal_evaluation_throttle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScarcityConfig {
    #[serde(default = "defaults::default_rank_window_ms")]
    pub rank_window_ms: u64,
    #[serde(default = "defaults::default_global_limit")]
    pub global_limit: u32,
    #[serde(default = "defaults::default_global_window_ms")]
    pub global_window_ms: u64,
    #[serde(default = "defaults::default_symbol_limit")]
    pub symbol_limit: u32,
    #[serde(default = "defaults::default_symbol_cooldown_ms")]
    pub symbol_cooldown_ms: u64,
}

impl Default for ScarcityConfig {
    fn default() -> Self {
        Self {
            rank_window_ms: defaults::default_rank_window_ms(),
            global_limit: defaults::default_global_limit(),
            global_window_ms: defaults::default_global_window_ms(),
            symbol_limit: defaults::default_symbol_limit(),
            symbol_cooldown_ms: defaults::default_symbol_cooldown_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "defaults::default_broker_port")]
    pub port: u16,
    #[serde(default = "defaults::default_broker_client_id")]
    pub client_id: i32,
    #[serde(default = "defaults::default_disconnect_threshold_seconds")]
    pub disconnect_threshold_seconds: u64,
    #[serde(default = "defaults::default_disconnect_check_interval_seconds")]
    pub disconnect_check_interval_seconds: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: defaults::default_broker_port(),
            client_id: defaults::default_broker_client_id(),
            disconnect_threshold_seconds: defaults::default_disconnect_threshold_seconds(),
            disconnect_check_interval_seconds: defaults::default_disconnect_check_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "defaults::default_prometheus_port")]
    pub prometheus_port: u16,
    #[serde(default = "defaults::default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus_port: defaults::default_prometheus_port(),
            log_level: defaults::default_log_level(),
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "defaults::default_true")]
    pub enable_prometheus: bool,
    #[serde(default = "defaults::default_metrics_addr")]
    pub metrics_addr: String,
    #[serde(default = "defaults::default_metrics_path")]
    pub metrics_path: String,
    #[serde(default = "defaults::default_true")]
    pub enable_journal: bool,
    #[serde(default = "defaults::default_journal_path")]
    pub journal_path: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_prometheus: true,
            metrics_addr: defaults::default_metrics_addr(),
            metrics_path: defaults::default_metrics_path(),
            enable_journal: true,
            journal_path: defaults::default_journal_path(),
        }
    }
}

/// Root configuration tree. Every sub-struct implements `Default`, so a
/// bare `trading_mode` + `broker.host` is technically a loadable config;
/// `validate()` is what actually gates startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trading_mode: TradingModeConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub tape_gate: TapeGateConfig,
    #[serde(default)]
    pub shadow_trading: ShadowTradingConfig,
    #[serde(default)]
    pub scarcity: ScarcityConfig,
    pub broker: BrokerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Thin serde wrapper so `TradingMode` (defined in `core::types` without a
/// `Default` impl, since "no mode" isn't meaningful there) has a sensible
/// config-file default of `Shadow`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingModeConfig(pub TradingMode);

impl Default for TradingModeConfig {
    fn default() -> Self {
        TradingModeConfig(TradingMode::Shadow)
    }
}

impl Config {
    /// Cross-field invariants cheaper to catch once at load time than at
    /// every call site (§4.6, §8 invariant 12).
    pub fn validate(&self) -> Result<(), String> {
        if self.market_data.max_depth_symbols > self.market_data.max_lines {
            return Err(format!(
                "market_data.max_depth_symbols ({}) must be <= market_data.max_lines ({})",
                self.market_data.max_depth_symbols, self.market_data.max_lines
            ));
        }
        if self.focus.min_score_delta_to_swap < 0.0 {
            return Err("focus.min_score_delta_to_swap must be >= 0".to_string());
        }
        if self.scarcity.rank_window_ms == 0 {
            return Err("scarcity.rank_window_ms must be > 0".to_string());
        }
        if self.scarcity.symbol_cooldown_ms < self.scarcity.rank_window_ms {
            return Err(format!(
                "scarcity.symbol_cooldown_ms ({}) must be >= scarcity.rank_window_ms ({})",
                self.scarcity.symbol_cooldown_ms, self.scarcity.rank_window_ms
            ));
        }
        if self.scarcity.global_limit == 0 {
            return Err("scarcity.global_limit must be > 0".to_string());
        }
        if self.market_data.max_lines == 0 {
            return Err("market_data.max_lines must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            trading_mode: TradingModeConfig::default(),
            market_data: MarketDataConfig::default(),
            universe: UniverseConfig::default(),
            focus: FocusConfig::default(),
            tape_gate: TapeGateConfig::default(),
            shadow_trading: ShadowTradingConfig::default(),
            scarcity: ScarcityConfig::default(),
            broker: BrokerConfig::default(),
            metrics: MetricsConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_depth_cap_above_line_cap() {
        let mut config = valid_config();
        config.market_data.max_depth_symbols = config.market_data.max_lines + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_symbol_cooldown_below_rank_window() {
        let mut config = valid_config();
        config.scarcity.symbol_cooldown_ms = config.scarcity.rank_window_ms - 1;
        assert!(config.validate().is_err());
    }
}
