//! Shared CLI plumbing for the signal-engine binaries.

pub mod common;
