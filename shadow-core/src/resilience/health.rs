//! Connection-health monitor: declares a stall after
//! `DisconnectThresholdSeconds` with no tick, polled on the orchestrator's
//! `DisconnectCheckIntervalSeconds` cadence. No gap detector or warmup
//! grace period; those cover shared-memory IPC concerns this feed adapter
//! doesn't have.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::types::BrokerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// A tick has landed within the disconnect threshold.
    Connected,
    /// No tick observed for longer than the disconnect threshold.
    Stalled,
}

/// Tracks the most recent tick timestamp and compares it against the
/// configured disconnect threshold on demand.
pub struct ConnectionHealthMonitor {
    last_tick_ms: AtomicU64,
    disconnect_threshold_ms: u64,
    check_interval_ms: u64,
}

impl ConnectionHealthMonitor {
    pub fn new(config: &BrokerConfig, started_at_ms: u64) -> Self {
        Self {
            last_tick_ms: AtomicU64::new(started_at_ms),
            disconnect_threshold_ms: config.disconnect_threshold_seconds * 1_000,
            check_interval_ms: config.disconnect_check_interval_seconds * 1_000,
        }
    }

    /// Record that a tick (depth update or trade print) was received.
    pub fn record_tick(&self, now_ms: u64) {
        self.last_tick_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Evaluate connection status as of `now_ms`. Intended to be called on
    /// the orchestrator's `check_interval_ms` cadence (`due_for_check`
    /// tells the caller when that cadence has elapsed).
    pub fn status(&self, now_ms: u64) -> HealthStatus {
        let last = self.last_tick_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) > self.disconnect_threshold_ms {
            HealthStatus::Stalled
        } else {
            HealthStatus::Connected
        }
    }

    pub fn is_stalled(&self, now_ms: u64) -> bool {
        self.status(now_ms) == HealthStatus::Stalled
    }

    /// Whether `check_interval_ms` has elapsed since `last_check_ms`.
    pub fn due_for_check(&self, last_check_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(last_check_ms) >= self.check_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold_secs: u64, interval_secs: u64) -> BrokerConfig {
        BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 7497,
            client_id: 1,
            disconnect_threshold_seconds: threshold_secs,
            disconnect_check_interval_seconds: interval_secs,
        }
    }

    #[test]
    fn connected_while_ticks_keep_arriving() {
        let monitor = ConnectionHealthMonitor::new(&config(30, 10), 0);
        monitor.record_tick(5_000);
        assert_eq!(monitor.status(10_000), HealthStatus::Connected);
    }

    #[test]
    fn stalls_after_threshold_with_no_tick() {
        let monitor = ConnectionHealthMonitor::new(&config(30, 10), 0);
        monitor.record_tick(5_000);
        assert_eq!(monitor.status(36_001), HealthStatus::Stalled);
    }

    #[test]
    fn due_for_check_respects_interval() {
        let monitor = ConnectionHealthMonitor::new(&config(30, 10), 0);
        assert!(!monitor.due_for_check(0, 5_000));
        assert!(monitor.due_for_check(0, 10_000));
    }
}
