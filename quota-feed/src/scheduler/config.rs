use crate::model::quote::QUOTE_WINDOW;
use std::time::Duration;

/// Default fixed tick period: roughly seven polls per minute.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(8_500);

/// Delay between the startup price poll and the startup active candle poll.
pub const DEFAULT_BOOTSTRAP_DELAY: Duration = Duration::from_secs(3);

/// Every n-th tick refreshes a background timeframe instead of the active one.
pub const DEFAULT_BACKGROUND_EVERY: u64 = 6;

/// Cached candles older than this are refreshed out of band on a timeframe switch.
pub const DEFAULT_FRESHNESS_THRESHOLD: Duration = Duration::from_secs(20);

/// Bars requested per `time_series` call.
pub const DEFAULT_CANDLE_OUTPUTSIZE: u16 = 100;

/// Configuration for a [`PollScheduler`](super::PollScheduler).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub tick_period: Duration,
    pub bootstrap_delay: Duration,
    pub background_every: u64,
    pub freshness_threshold: Duration,
    pub candle_outputsize: u16,
    pub quote_window: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            bootstrap_delay: DEFAULT_BOOTSTRAP_DELAY,
            background_every: DEFAULT_BACKGROUND_EVERY,
            freshness_threshold: DEFAULT_FRESHNESS_THRESHOLD,
            candle_outputsize: DEFAULT_CANDLE_OUTPUTSIZE,
            quote_window: QUOTE_WINDOW,
        }
    }
}

impl SchedulerConfig {
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    pub fn with_candle_outputsize(mut self, candle_outputsize: u16) -> Self {
        self.candle_outputsize = candle_outputsize;
        self
    }

    pub fn with_freshness_threshold(mut self, freshness_threshold: Duration) -> Self {
        self.freshness_threshold = freshness_threshold;
        self
    }
}
