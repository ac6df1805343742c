//! Prometheus metrics for the signal engine.
//!
//! Grouped into one sub-family per subsystem: a central `MetricsRegistry`
//! owns one `Arc<...Metrics>` per family and hands out shared references.

pub mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use tracing::info;

/// Central registry for all Prometheus metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    subscription: Arc<SubscriptionMetrics>,
    coordinator: Arc<CoordinatorMetrics>,
    scarcity: Arc<ScarcityMetrics>,
    system: Arc<SystemMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let subscription = Arc::new(SubscriptionMetrics::new(&registry)?);
        let coordinator = Arc::new(CoordinatorMetrics::new(&registry)?);
        let scarcity = Arc::new(ScarcityMetrics::new(&registry)?);
        let system = Arc::new(SystemMetrics::new(&registry)?);

        info!("prometheus metrics registry initialized");

        Ok(Self {
            registry,
            subscription,
            coordinator,
            scarcity,
            system,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn subscription(&self) -> &SubscriptionMetrics {
        &self.subscription
    }

    pub fn coordinator(&self) -> &CoordinatorMetrics {
        &self.coordinator
    }

    pub fn scarcity(&self) -> &ScarcityMetrics {
        &self.scarcity
    }

    pub fn system(&self) -> &SystemMetrics {
        &self.system
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("FATAL: failed to create metrics registry: {}", e);
            panic!("cannot create metrics registry")
        })
    }
}

/// Subscription / line-budget metrics.
pub struct SubscriptionMetrics {
    /// Broker market-data lines currently in use out of `max_lines`.
    pub lines_in_use: IntGauge,
    /// Symbols currently holding a depth subscription out of `max_depth_symbols`.
    pub depth_cap_utilization: IntGauge,
    /// Focus rotations (evictions + promotions) since process start.
    pub focus_rotations_total: IntCounter,
    /// Symbols currently serving out a depth-ineligible or tick-by-tick-cap cooldown.
    pub cooldowns_active: IntGauge,
}

impl SubscriptionMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let lines_in_use = IntGauge::new(
            "shadow_subscription_lines_in_use",
            "Broker market-data lines currently in use",
        )?;
        registry.register(Box::new(lines_in_use.clone()))?;

        let depth_cap_utilization = IntGauge::new(
            "shadow_subscription_depth_cap_utilization",
            "Symbols currently holding a depth subscription",
        )?;
        registry.register(Box::new(depth_cap_utilization.clone()))?;

        let focus_rotations_total = IntCounter::new(
            "shadow_subscription_focus_rotations_total",
            "Total focus rotations (evictions plus promotions)",
        )?;
        registry.register(Box::new(focus_rotations_total.clone()))?;

        let cooldowns_active = IntGauge::new(
            "shadow_subscription_cooldowns_active",
            "Symbols currently serving out a depth-ineligible or tick-by-tick-cap cooldown",
        )?;
        registry.register(Box::new(cooldowns_active.clone()))?;

        Ok(Self {
            lines_in_use,
            depth_cap_utilization,
            focus_rotations_total,
            cooldowns_active,
        })
    }
}

/// Decision-pipeline metrics.
pub struct CoordinatorMetrics {
    /// Snapshots handed to `evaluate_snapshot`.
    pub snapshots_processed_total: IntCounter,
    /// Rejections by gate name (`BookInvalid`, `NoDepth`, `SpoofSuspected`, ...).
    pub gate_rejections_total: IntCounterVec,
    /// Confidence score of accepted blueprints.
    pub blueprint_confidence: Histogram,
}

impl CoordinatorMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let snapshots_processed_total = IntCounter::new(
            "shadow_coordinator_snapshots_processed_total",
            "Total snapshots handed to the decision pipeline",
        )?;
        registry.register(Box::new(snapshots_processed_total.clone()))?;

        let gate_rejections_total = IntCounterVec::new(
            Opts::new("coordinator_gate_rejections_total", "Total rejections by gate").namespace("shadow"),
            &["gate"],
        )?;
        registry.register(Box::new(gate_rejections_total.clone()))?;

        let blueprint_confidence = Histogram::with_opts(
            HistogramOpts::new(
                "shadow_coordinator_blueprint_confidence",
                "Confidence score of accepted blueprints",
            )
            .buckets(vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0]),
        )?;
        registry.register(Box::new(blueprint_confidence.clone()))?;

        Ok(Self {
            snapshots_processed_total,
            gate_rejections_total,
            blueprint_confidence,
        })
    }
}

/// Scarcity controller metrics.
pub struct ScarcityMetrics {
    /// Candidates staged into a rank window.
    pub candidates_staged_total: IntCounter,
    /// Resolutions by outcome (`Accepted`, `GlobalLimit`, `SymbolLimit`, `SymbolCooldown`, `RejectedRankedOut`).
    pub resolutions_total: IntCounterVec,
    /// Latency between a candidate staging and its window flush.
    pub rank_window_latency_ms: Histogram,
}

impl ScarcityMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let candidates_staged_total = IntCounter::new(
            "shadow_scarcity_candidates_staged_total",
            "Total candidates staged into a scarcity rank window",
        )?;
        registry.register(Box::new(candidates_staged_total.clone()))?;

        let resolutions_total = IntCounterVec::new(
            Opts::new("scarcity_resolutions_total", "Total scarcity resolutions by outcome").namespace("shadow"),
            &["outcome"],
        )?;
        registry.register(Box::new(resolutions_total.clone()))?;

        let rank_window_latency_ms = Histogram::with_opts(
            HistogramOpts::new(
                "shadow_scarcity_rank_window_latency_ms",
                "Latency between a candidate staging and its window flush",
            )
            .buckets(vec![1.0, 5.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0]),
        )?;
        registry.register(Box::new(rank_window_latency_ms.clone()))?;

        Ok(Self {
            candidates_staged_total,
            resolutions_total,
            rank_window_latency_ms,
        })
    }
}

/// System / feed-health metrics.
pub struct SystemMetrics {
    /// Broker feed connection status (1 = connected, 0 = disconnected).
    pub feed_connected: IntGauge,
    /// Sequence gaps detected in the inbound feed.
    pub sequence_gaps_total: IntCounter,
    /// Data-quality flags raised by `OrderBookState` (crossed book, non-monotonic ts, ...).
    pub data_quality_flags_total: IntCounterVec,
    /// Journal entries dropped because the writer channel was full.
    pub journal_entries_dropped_total: IntCounter,
    /// Process uptime.
    pub uptime_seconds: IntGauge,
}

impl SystemMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let feed_connected = IntGauge::new(
            "shadow_system_feed_connected",
            "Broker feed connection status (1 = connected, 0 = disconnected)",
        )?;
        registry.register(Box::new(feed_connected.clone()))?;

        let sequence_gaps_total = IntCounter::new(
            "shadow_system_sequence_gaps_total",
            "Total sequence gaps detected in the inbound feed",
        )?;
        registry.register(Box::new(sequence_gaps_total.clone()))?;

        let data_quality_flags_total = IntCounterVec::new(
            Opts::new("system_data_quality_flags_total", "Total data-quality flags by kind").namespace("shadow"),
            &["kind"],
        )?;
        registry.register(Box::new(data_quality_flags_total.clone()))?;

        let journal_entries_dropped_total = IntCounter::new(
            "shadow_system_journal_entries_dropped_total",
            "Total journal entries dropped because the writer channel was full",
        )?;
        registry.register(Box::new(journal_entries_dropped_total.clone()))?;

        let uptime_seconds = IntGauge::new("shadow_system_uptime_seconds", "Process uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            feed_connected,
            sequence_gaps_total,
            data_quality_flags_total,
            journal_entries_dropped_total,
            uptime_seconds,
        })
    }
}
