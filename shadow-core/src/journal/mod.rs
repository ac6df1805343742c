//! Append-only decision journal: entry shape, the abstract sink trait, and
//! the concrete JSONL writer (§6).

pub mod jsonl;

use serde::{Deserialize, Serialize};

use crate::core::types::{DecisionId, SessionId, Symbol, TradingMode};

/// Bumped whenever a field is renamed or removed; additions are
/// non-breaking (§9 "Journal schema evolution").
pub const JOURNAL_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Signal,
    Rejection,
    Heartbeat,
    UniverseUpdate,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionOutcome {
    Accepted,
    Rejected,
    Pending,
    Canceled,
    NotReady,
}

/// One audit record. Nested snapshots are left as loosely-typed JSON so
/// readers can tolerate fields this crate hasn't learned about yet and so
/// each pipeline stage only has to populate the nests it actually touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub schema_version: u32,
    pub session_id: SessionId,
    pub decision_id: DecisionId,
    pub entry_type: EntryType,
    pub market_timestamp_utc: String,
    pub decision_timestamp_utc: String,
    pub trading_mode: TradingMode,
    pub symbol: Symbol,
    pub decision_outcome: DecisionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_metrics: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_inputs: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_trace: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_metrics: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub universe_update: Option<serde_json::Value>,
}

impl JournalEntry {
    pub fn new(
        session_id: SessionId,
        decision_id: DecisionId,
        entry_type: EntryType,
        trading_mode: TradingMode,
        symbol: Symbol,
        decision_outcome: DecisionOutcome,
        market_timestamp_utc: String,
        decision_timestamp_utc: String,
    ) -> Self {
        Self {
            schema_version: JOURNAL_SCHEMA_VERSION,
            session_id,
            decision_id,
            entry_type,
            market_timestamp_utc,
            decision_timestamp_utc,
            trading_mode,
            symbol,
            decision_outcome,
            rejection_reason: None,
            observed_metrics: None,
            decision_inputs: None,
            decision_result: None,
            blueprint: None,
            gate_trace: None,
            system_metrics: None,
            universe_update: None,
        }
    }
}

/// Outbound, append-only persistence for journal entries. Implementors
/// must not block the caller of `record` for any meaningful amount of time
/// — entries are best-effort, not authoritative state (§5).
pub trait JournalSink: Send + Sync {
    fn record(&self, entry: JournalEntry);
}

/// A sink that discards everything; useful for `Replay`-mode runs that
/// only care about the computed decisions, not their audit trail.
pub struct NullJournal;

impl JournalSink for NullJournal {
    fn record(&self, _entry: JournalEntry) {}
}
