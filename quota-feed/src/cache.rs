use crate::{
    model::{Stamped, candle::CandleSet, price::PricePoint, quote::Quote},
    timeframe::Timeframe,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Latest successfully fetched snapshot of the feed.
///
/// Written only by the [`PollScheduler`](crate::scheduler::PollScheduler). Every entry is an
/// immutable [`Arc`] replaced whole, so concurrent readers observe either the previous or the
/// next value and never a partial write. Entries are never deleted.
#[derive(Debug, Default)]
pub struct SharedCache {
    price: RwLock<Option<Arc<Stamped<PricePoint>>>>,
    quote: RwLock<Option<Arc<Stamped<Quote>>>>,
    candles: RwLock<FnvHashMap<Timeframe, Arc<Stamped<CandleSet>>>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price(&self) -> Option<Arc<Stamped<PricePoint>>> {
        self.price.read().clone()
    }

    pub fn quote(&self) -> Option<Arc<Stamped<Quote>>> {
        self.quote.read().clone()
    }

    pub fn candles(&self, timeframe: Timeframe) -> Option<Arc<Stamped<CandleSet>>> {
        self.candles.read().get(&timeframe).cloned()
    }

    /// Every cached [`CandleSet`], ordered shortest timeframe first.
    pub fn all_candles(&self) -> Vec<Arc<Stamped<CandleSet>>> {
        let mut candles = self.candles.read().values().cloned().collect::<Vec<_>>();
        candles.sort_by_key(|entry| entry.value.timeframe);
        candles
    }

    pub fn put_price(&self, price: PricePoint, now: DateTime<Utc>) -> Arc<Stamped<PricePoint>> {
        replace(&mut self.price.write(), price, now)
    }

    pub fn put_quote(&self, quote: Quote, now: DateTime<Utc>) -> Arc<Stamped<Quote>> {
        replace(&mut self.quote.write(), quote, now)
    }

    pub fn put_candles(&self, candles: CandleSet, now: DateTime<Utc>) -> Arc<Stamped<CandleSet>> {
        let mut guard = self.candles.write();
        let mut slot = guard.get(&candles.timeframe).cloned();
        let entry = replace(&mut slot, candles, now);
        guard.insert(entry.value.timeframe, Arc::clone(&entry));
        entry
    }

    /// Newest update time across every entry.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        let price = self.price.read().as_ref().map(|entry| entry.updated_at);
        let quote = self.quote.read().as_ref().map(|entry| entry.updated_at);
        let candles = self
            .candles
            .read()
            .values()
            .map(|entry| entry.updated_at)
            .max();

        [price, quote, candles].into_iter().flatten().max()
    }
}

/// Overwrite `slot`, never letting its timestamp move backwards.
fn replace<T>(
    slot: &mut Option<Arc<Stamped<T>>>,
    value: T,
    now: DateTime<Utc>,
) -> Arc<Stamped<T>> {
    let updated_at = slot
        .as_ref()
        .map_or(now, |previous| now.max(previous.updated_at));

    let entry = Arc::new(Stamped::new(value, updated_at));
    *slot = Some(Arc::clone(&entry));
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candle::Candle;
    use chrono::TimeDelta;

    fn price(value: f64) -> PricePoint {
        PricePoint {
            symbol: "XAU/USD".into(),
            price: value,
        }
    }

    fn candles(timeframe: Timeframe, close: f64) -> CandleSet {
        CandleSet::new(
            timeframe,
            vec![Candle {
                datetime: "2024-05-01 10:00:00".to_string(),
                open: close,
                high: close,
                low: close,
                close,
                volume: None,
            }],
        )
    }

    #[test]
    fn test_empty_cache_reports_absent() {
        let cache = SharedCache::new();
        assert!(cache.price().is_none());
        assert!(cache.quote().is_none());
        assert!(cache.candles(Timeframe::OneHour).is_none());
        assert!(cache.last_updated().is_none());
    }

    #[test]
    fn test_put_overwrites_and_keeps_previous_snapshot_intact() {
        let cache = SharedCache::new();
        let now = Utc::now();

        cache.put_price(price(2300.0), now);
        let reader_snapshot = cache.price().unwrap();
        cache.put_price(price(2301.5), now + TimeDelta::seconds(8));

        assert_eq!(reader_snapshot.value.price, 2300.0);
        assert_eq!(cache.price().unwrap().value.price, 2301.5);
    }

    #[test]
    fn test_price_timestamp_is_monotonic() {
        let cache = SharedCache::new();
        let now = Utc::now();

        let first = cache.put_price(price(1.0), now);
        // Wall clock stepped backwards between polls
        let second = cache.put_price(price(2.0), now - TimeDelta::seconds(5));
        let third = cache.put_price(price(3.0), now + TimeDelta::seconds(5));

        assert_eq!(second.updated_at, first.updated_at);
        assert!(third.updated_at >= second.updated_at);
    }

    #[test]
    fn test_candle_sets_coexist_per_timeframe() {
        let cache = SharedCache::new();
        let now = Utc::now();

        cache.put_candles(candles(Timeframe::OneHour, 10.0), now);
        cache.put_candles(candles(Timeframe::OneMinute, 20.0), now + TimeDelta::seconds(1));
        cache.put_candles(candles(Timeframe::OneHour, 30.0), now + TimeDelta::seconds(2));

        let all = cache.all_candles();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].value.timeframe, Timeframe::OneMinute);
        assert_eq!(all[1].value.latest().unwrap().close, 30.0);
        assert_eq!(cache.last_updated(), Some(now + TimeDelta::seconds(2)));
    }
}
