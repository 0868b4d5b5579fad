//! Quota Feed - Rate-Budgeted Market Data Core
//!
//! Multiplexes many downstream consumers of one instrument's price, quote and multi-timeframe
//! candles onto a single upstream that enforces a hard per-minute call quota.
//!
//! The library includes:
//! - Sliding window quota tracker with an atomic try-admit
//! - Quota-guarded upstream client over a pluggable HTTP transport
//! - Shared snapshot cache of the latest successful fetches
//! - Single actor poll scheduler interleaving price, active and background candle polls
//! - Push fan-out broadcaster with bootstrap snapshots and keep-alives

pub mod broadcast;
pub mod cache;
pub mod error;
pub mod feed;
pub mod model;
pub mod quota;
pub mod scheduler;
pub mod status;
pub mod timeframe;
pub mod upstream;

// Re-export commonly used types for convenience
pub use broadcast::{
    BootstrapScope, BroadcastConfig, Broadcaster, FeedEvent, PushMessage, SubscriberId,
    Subscription,
};
pub use cache::SharedCache;
pub use error::{FeedError, UpstreamError};
pub use feed::{Feed, FeedConfig};
pub use model::{Stamped, candle::Candle, candle::CandleSet, price::PricePoint, quote::Quote};
pub use quota::{QuotaTracker, UPSTREAM_HARD_CAP};
pub use scheduler::{
    PollOutcome, PollScheduler, SchedulerConfig, SchedulerHandle, SwitchOutcome, SwitchRefresh,
};
pub use status::FeedStatus;
pub use timeframe::{Timeframe, TimeframeSelector, UnknownTimeframe};
pub use upstream::{UpstreamClient, UpstreamConfig};
