//! Broker reconnection policy: the protocol itself is out of scope, but the
//! backoff spacing and stall detection around it are ambient engineering
//! this crate owns directly.
//!
//! The session binary owns the actual reconnect loop: on a stalled
//! `ConnectionHealthMonitor`, it waits out `ExponentialBackoff::next_delay`,
//! reconnects, and re-subscribes the Active Universe through
//! `MarketDataSubscriptionManager`'s public contract — there is no bespoke
//! recovery path distinct from a cold-start reconcile.

pub mod backoff;
pub mod health;
pub mod shutdown;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use health::{ConnectionHealthMonitor, HealthStatus};
pub use shutdown::ShutdownToken;
