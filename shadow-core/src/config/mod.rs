pub mod defaults;
pub mod types;

pub use types::{
    BrokerConfig, Config, MarketDataConfig, MetricsConfig, MonitoringConfig, ScarcityConfig,
    ShadowTradingConfig, TapeGateConfig, TradingModeConfig, UniverseConfig,
};

use std::path::Path;

use crate::core::errors::ConfigError;

/// Load and validate a `Config` from a TOML file. Environment variables of
/// the form `SHADOW_<SECTION>__<FIELD>` are not parsed here; the CLI binary
/// layers those on top before calling `validate()` a second time: load
/// struct, then override, then validate once.
pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = toml::from_str(&raw)?;
    config
        .validate()
        .map_err(ConfigError::Invalid)?;
    Ok(config)
}
