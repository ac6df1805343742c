pub mod errors;
pub mod types;

pub use errors::{
    BookIntegrityError, ConfigError, FeedErrorClass, FeedEventError, JournalError,
    SubscriptionError,
};
pub use types::{
    fixed_point, DecisionId, DepthOp, DepthUpdate, Direction, RequestId, SessionId, Side, Symbol,
    TradePrint, TradingMode,
};
