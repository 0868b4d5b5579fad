use crate::{
    broadcast::Broadcaster,
    cache::SharedCache,
    quota::QuotaTracker,
    timeframe::{Timeframe, TimeframeSelector},
};
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Point in time diagnostic snapshot of the feed, read from live state.
///
/// Timestamps are epoch milliseconds.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct FeedStatus {
    pub symbol: SmolStr,
    pub quota_used: usize,
    pub quota_limit: usize,
    pub quota_window_secs: u64,
    pub subscribers: usize,
    pub active_timeframe: Timeframe,
    pub last_update: Option<i64>,
    pub price_updated_at: Option<i64>,
    pub quote_updated_at: Option<i64>,
    pub candles_updated_at: BTreeMap<Timeframe, i64>,
}

impl FeedStatus {
    pub fn collect(
        symbol: SmolStr,
        quota: &QuotaTracker,
        cache: &SharedCache,
        broadcaster: &Broadcaster,
        selector: &TimeframeSelector,
    ) -> Self {
        Self {
            symbol,
            quota_used: quota.used(),
            quota_limit: quota.limit(),
            quota_window_secs: quota.window().as_secs(),
            subscribers: broadcaster.subscriber_count(),
            active_timeframe: selector.active(),
            last_update: cache.last_updated().map(|time| time.timestamp_millis()),
            price_updated_at: cache.price().map(|entry| entry.updated_at_ms()),
            quote_updated_at: cache.quote().map(|entry| entry.updated_at_ms()),
            candles_updated_at: cache
                .all_candles()
                .iter()
                .map(|entry| (entry.value.timeframe, entry.updated_at_ms()))
                .collect(),
        }
    }
}
