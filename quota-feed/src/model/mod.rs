use chrono::{DateTime, Utc};
use derive_more::Constructor;
use serde::Serialize;

/// Candle bars and [`CandleSet`](candle::CandleSet) keyed by [`Timeframe`](crate::timeframe::Timeframe).
pub mod candle;

/// Latest instrument price.
pub mod price;

/// [`Quote`](quote::Quote) derived from the active timeframe's candles.
pub mod quote;

/// A cached value together with the server time it was received.
#[derive(Clone, PartialEq, Debug, Serialize, Constructor)]
pub struct Stamped<T> {
    pub value: T,
    pub updated_at: DateTime<Utc>,
}

impl<T> Stamped<T> {
    pub fn updated_at_ms(&self) -> i64 {
        self.updated_at.timestamp_millis()
    }

    /// Age of the value relative to `now`, saturating at zero.
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.updated_at).to_std().unwrap_or_default()
    }
}
