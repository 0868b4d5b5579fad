use crate::{
    model::{
        Stamped,
        candle::{Candle, CandleSet},
        price::PricePoint,
        quote::Quote,
    },
    timeframe::Timeframe,
};
use serde::Serialize;
use std::sync::Arc;

/// Update pushed to every subscriber.
///
/// Serialises to `{ "type": "price" | "quote" | "candles", "interval"?, "data", "ts" }` where
/// `ts` is the epoch millisecond time the value was stored in the cache.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedEvent {
    Price {
        data: PricePoint,
        ts: i64,
    },
    Quote {
        interval: Timeframe,
        data: Quote,
        ts: i64,
    },
    Candles {
        interval: Timeframe,
        data: Arc<[Candle]>,
        ts: i64,
    },
}

impl FeedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::Price { .. } => "price",
            FeedEvent::Quote { .. } => "quote",
            FeedEvent::Candles { .. } => "candles",
        }
    }

    pub fn interval(&self) -> Option<Timeframe> {
        match self {
            FeedEvent::Price { .. } => None,
            FeedEvent::Quote { interval, .. } | FeedEvent::Candles { interval, .. } => {
                Some(*interval)
            }
        }
    }

    pub fn ts(&self) -> i64 {
        match self {
            FeedEvent::Price { ts, .. }
            | FeedEvent::Quote { ts, .. }
            | FeedEvent::Candles { ts, .. } => *ts,
        }
    }
}

impl From<&Stamped<PricePoint>> for FeedEvent {
    fn from(entry: &Stamped<PricePoint>) -> Self {
        Self::Price {
            data: entry.value.clone(),
            ts: entry.updated_at_ms(),
        }
    }
}

impl From<&Stamped<Quote>> for FeedEvent {
    fn from(entry: &Stamped<Quote>) -> Self {
        Self::Quote {
            interval: entry.value.interval,
            data: entry.value.clone(),
            ts: entry.updated_at_ms(),
        }
    }
}

impl From<&Stamped<CandleSet>> for FeedEvent {
    fn from(entry: &Stamped<CandleSet>) -> Self {
        Self::Candles {
            interval: entry.value.timeframe,
            data: Arc::clone(&entry.value.bars),
            ts: entry.updated_at_ms(),
        }
    }
}

/// Message delivered down a subscriber's push channel.
#[derive(Clone, PartialEq, Debug)]
pub enum PushMessage {
    Event(FeedEvent),
    /// No-op that keeps idle intermediaries from timing the connection out.
    KeepAlive,
}
