//! Shared initialization and CLI plumbing for the signal-engine binaries.

use anyhow::Result;
use clap::Parser;
use shadow_core::resilience::ShutdownToken;

/// Common CLI arguments shared by both binaries.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Override `metrics.log_level` from the config file.
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Override `metrics.json_logs` from the config file.
    #[arg(long)]
    pub json_logs: bool,
}

/// Install the Ctrl+C handler, wiring `ctrlc` to the shared shutdown token.
pub fn install_ctrlc_handler(token: ShutdownToken) -> Result<()> {
    ctrlc::set_handler(move || {
        token.shutdown("Ctrl+C received");
    })?;
    Ok(())
}
