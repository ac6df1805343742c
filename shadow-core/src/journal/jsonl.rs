//! `JsonlFileJournal`: a dedicated writer thread fed by a bounded
//! `crossbeam-channel`. `record()` never blocks; a full channel drops the
//! entry and logs a warning, and `Drop` flushes.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{error, warn};

use super::{JournalEntry, JournalSink};

const CHANNEL_CAPACITY: usize = 4_096;

/// Append-only JSONL sink backed by a dedicated writer thread.
pub struct JsonlFileJournal {
    sender: Option<Sender<JournalEntry>>,
    thread_handle: Option<thread::JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
}

impl JsonlFileJournal {
    pub fn new(path: PathBuf) -> std::io::Result<Self> {
        // Fail fast if the path isn't writable rather than discovering it
        // on the first dropped entry inside the writer thread.
        OpenOptions::new().create(true).append(true).open(&path)?;

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let handle = thread::Builder::new()
            .name("journal-writer".to_string())
            .spawn(move || Self::writer_loop(path, receiver))
            .expect("failed to spawn journal writer thread");

        Ok(Self {
            sender: Some(sender),
            thread_handle: Some(handle),
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    fn writer_loop(path: PathBuf, receiver: Receiver<JournalEntry>) {
        let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                error!(?path, error = %e, "journal writer could not open file, entries will be lost");
                return;
            }
        };

        for entry in receiver {
            match serde_json::to_string(&entry) {
                Ok(line) => {
                    if let Err(e) = writeln!(file, "{}", line) {
                        error!(error = %e, "journal writer failed to append entry");
                    }
                }
                Err(e) => error!(error = %e, "failed to serialize journal entry"),
            }
        }
        let _ = file.flush();
    }

    /// Count of entries dropped because the channel was full. Surfaced via
    /// `SystemMetrics` (§4.8).
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl JournalSink for JsonlFileJournal {
    fn record(&self, entry: JournalEntry) {
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.try_send(entry) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "journal channel full, dropping entry");
            }
        }
    }
}

impl Drop for JsonlFileJournal {
    fn drop(&mut self) {
        let _ = self.sender.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DecisionId, SessionId, TradingMode};
    use crate::journal::{DecisionOutcome, EntryType};

    #[test]
    fn writes_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        {
            let journal = JsonlFileJournal::new(path.clone()).unwrap();
            for i in 0..5 {
                journal.record(JournalEntry::new(
                    SessionId::new(),
                    DecisionId::new(),
                    EntryType::Heartbeat,
                    TradingMode::Shadow,
                    format!("SYM{}", i),
                    DecisionOutcome::Pending,
                    "2026-01-01T00:00:00Z".to_string(),
                    "2026-01-01T00:00:00Z".to_string(),
                ));
            }
        } // Drop joins the writer thread, guaranteeing flush before we read.

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 5);
        for line in contents.lines() {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn drop_joins_writer_thread_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let journal = JsonlFileJournal::new(path).unwrap();
        drop(journal);
    }
}
