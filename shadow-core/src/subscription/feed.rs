//! The feed-adapter contract (§6): the broker wire protocol itself is out
//! of scope, but `SubscriptionManager` talks to it only through this trait,
//! shaped after the broker wrapper's `subscribe`/`enable_tick_by_tick`/
//! `error(req_id, code, message)` callback surface.

use crate::core::errors::{FeedErrorClass, SubscriptionError};
use crate::core::types::RequestId;

/// Result of a successful tape (and optionally depth) subscribe call.
#[derive(Debug, Clone)]
pub struct SubscribeAck {
    pub mkt_data_id: RequestId,
    pub depth_id: Option<RequestId>,
    pub primary_exchange: String,
}

/// Outbound operations the subscription manager drives during a reconcile
/// pass. Implementations own the concrete broker session; errors surface
/// back through `FeedErrorClass::from_broker_code`.
pub trait FeedAdapter: Send + Sync {
    fn subscribe(&self, symbol: &str, include_depth: bool) -> Result<SubscribeAck, SubscriptionError>;
    fn unsubscribe(&self, symbol: &str) -> Result<(), SubscriptionError>;
    fn enable_tick_by_tick(&self, symbol: &str) -> Result<RequestId, SubscriptionError>;
    fn disable_tick_by_tick(&self, symbol: &str) -> Result<(), SubscriptionError>;
    fn disable_depth(&self, symbol: &str) -> Result<(), SubscriptionError>;
}

/// Normalized shape of the feed adapter's asynchronous error callback,
/// mirroring `Wrapper::error(req_id, error_code, error_string)`.
#[derive(Debug, Clone)]
pub struct FeedError {
    pub request_id: RequestId,
    pub code: i32,
    pub message: String,
}

impl FeedError {
    pub fn class(&self) -> FeedErrorClass {
        FeedErrorClass::from_broker_code(self.code)
    }
}
