use super::candle::{Candle, CandleSet};
use crate::timeframe::Timeframe;
use serde::{Deserialize, Serialize};

/// Number of most recent bars a [`Quote`] is derived from.
pub const QUOTE_WINDOW: usize = 60;

/// Aggregate over the most recent bars of the active [`Timeframe`].
///
/// This is not an upstream quote: it is recomputed by the core every time the active
/// timeframe's candles are refreshed, so its freshness tracks candle freshness exactly.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct Quote {
    pub interval: Timeframe,
    /// Open of the chronologically oldest bar in the window.
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// Close of the newest bar in the window.
    pub close: f64,
    /// Bars the aggregate was computed over, at most [`QUOTE_WINDOW`].
    pub bars: usize,
}

impl Quote {
    /// Derive a [`Quote`] from newest-first `bars`, considering at most `window` of them.
    ///
    /// Returns `None` when there are no bars.
    pub fn derive(interval: Timeframe, bars: &[Candle], window: usize) -> Option<Self> {
        let recent = &bars[..bars.len().min(window)];
        let (newest, oldest) = (recent.first()?, recent.last()?);

        let (high, low) = recent.iter().fold(
            (f64::NEG_INFINITY, f64::INFINITY),
            |(high, low), bar| (high.max(bar.high), low.min(bar.low)),
        );

        Some(Self {
            interval,
            open: oldest.open,
            high,
            low,
            close: newest.close,
            bars: recent.len(),
        })
    }

    pub fn from_candles(candles: &CandleSet) -> Option<Self> {
        Self::derive(candles.timeframe, &candles.bars, QUOTE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(index: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            datetime: format!("2024-05-01 10:{index:02}:00"),
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    #[test]
    fn test_quote_over_sixty_newest_first_bars() {
        // Bar 0 is the newest, bar 59 the oldest
        let bars = (0..60)
            .map(|i| {
                let base = 2300.0 + i as f64;
                bar(i, base + 0.5, base + 2.0 + (i % 7) as f64, base - 1.0 - (i % 5) as f64, base)
            })
            .collect::<Vec<_>>();

        let quote = Quote::from_candles(&CandleSet::new(Timeframe::FiveMinutes, bars.clone()))
            .unwrap();

        let expected_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let expected_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);

        assert_eq!(quote.interval, Timeframe::FiveMinutes);
        assert_eq!(quote.high, expected_high);
        assert_eq!(quote.low, expected_low);
        assert_eq!(quote.open, bars[59].open);
        assert_eq!(quote.close, bars[0].close);
        assert_eq!(quote.bars, 60);
    }

    #[test]
    fn test_quote_window_ignores_older_bars() {
        let mut bars = (0..QUOTE_WINDOW)
            .map(|i| bar(i, 10.0, 11.0, 9.0, 10.0))
            .collect::<Vec<_>>();
        // Extremes beyond the window must not leak into the aggregate
        bars.push(bar(60, 1.0, 1000.0, 0.1, 1.0));

        let quote = Quote::derive(Timeframe::OneMinute, &bars, QUOTE_WINDOW).unwrap();

        assert_eq!(quote.high, 11.0);
        assert_eq!(quote.low, 9.0);
        assert_eq!(quote.open, 10.0);
        assert_eq!(quote.bars, QUOTE_WINDOW);
    }

    #[test]
    fn test_quote_with_fewer_bars_than_window() {
        let bars = vec![bar(1, 4.0, 6.0, 3.5, 5.0), bar(0, 2.0, 4.5, 1.5, 4.0)];

        let quote = Quote::derive(Timeframe::OneHour, &bars, QUOTE_WINDOW).unwrap();

        assert_eq!(quote.open, 2.0);
        assert_eq!(quote.close, 5.0);
        assert_eq!(quote.high, 6.0);
        assert_eq!(quote.low, 1.5);
        assert_eq!(quote.bars, 2);
    }

    #[test]
    fn test_quote_without_bars() {
        assert_eq!(Quote::derive(Timeframe::OneHour, &[], QUOTE_WINDOW), None);
    }
}
