use crate::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One OHLC bar as reported by the upstream.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct Candle {
    /// Bucket open time exactly as the upstream formats it (exchange local time).
    pub datetime: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Bars for a single [`Timeframe`], newest first.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct CandleSet {
    pub timeframe: Timeframe,
    pub bars: Arc<[Candle]>,
}

impl CandleSet {
    pub fn new(timeframe: Timeframe, bars: Vec<Candle>) -> Self {
        Self {
            timeframe,
            bars: Arc::from(bars),
        }
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.bars.first()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
