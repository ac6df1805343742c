//! Process-shutdown token: every long-running loop polls this instead of
//! its own ad-hoc flag, so a single Ctrl+C drains the journal and exits
//! every loop in the same tick. No pause/resume states and no
//! signal_hook-registered SIGUSR handlers; nothing in this session drives
//! a pause/resume workflow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

#[derive(Clone)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    pub fn should_stop(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn shutdown(&self, reason: &str) {
        info!(reason, "shutdown token triggered");
        self.flag.store(true, Ordering::Release);
        *self.reason.lock() = Some(reason.to_string());
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let token = ShutdownToken::new();
        assert!(!token.should_stop());
        assert!(token.reason().is_none());
    }

    #[test]
    fn shutdown_latches_and_records_reason() {
        let token = ShutdownToken::new();
        token.shutdown("ctrl-c");
        assert!(token.should_stop());
        assert_eq!(token.reason(), Some("ctrl-c".to_string()));
    }

    #[test]
    fn clone_shares_state() {
        let token = ShutdownToken::new();
        let clone = token.clone();
        clone.shutdown("from clone");
        assert!(token.should_stop());
    }
}
