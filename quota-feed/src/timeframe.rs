use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
    sync::atomic::{AtomicU8, Ordering},
};
use thiserror::Error;

/// Candle bucket resolution understood by the upstream `interval` parameter.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
)]
pub enum Timeframe {
    #[serde(rename = "1min")]
    OneMinute,
    #[default]
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
}

impl Timeframe {
    /// Every supported [`Timeframe`], shortest first.
    pub const ALL: [Timeframe; 6] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1min",
            Timeframe::FiveMinutes => "5min",
            Timeframe::FifteenMinutes => "15min",
            Timeframe::ThirtyMinutes => "30min",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
        }
    }

    fn as_u8(&self) -> u8 {
        *self as u8
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .unwrap_or_default()
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("unsupported timeframe: {0}")]
pub struct UnknownTimeframe(pub String);

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|timeframe| timeframe.as_str().eq_ignore_ascii_case(input.trim()))
            .ok_or_else(|| UnknownTimeframe(input.to_string()))
    }
}

/// Process-wide "active" candle resolution.
///
/// Read lock-free by the scheduler and bootstrap logic. Written only through
/// [`SchedulerHandle::switch_timeframe`](crate::scheduler::SchedulerHandle::switch_timeframe).
#[derive(Debug)]
pub struct TimeframeSelector {
    active: AtomicU8,
}

impl TimeframeSelector {
    pub fn new(initial: Timeframe) -> Self {
        Self {
            active: AtomicU8::new(initial.as_u8()),
        }
    }

    #[inline]
    pub fn active(&self) -> Timeframe {
        Timeframe::from_u8(self.active.load(Ordering::Acquire))
    }

    /// Replace the active timeframe, returning the previous one.
    pub(crate) fn set(&self, timeframe: Timeframe) -> Timeframe {
        Timeframe::from_u8(self.active.swap(timeframe.as_u8(), Ordering::AcqRel))
    }
}

impl Default for TimeframeSelector {
    fn default() -> Self {
        Self::new(Timeframe::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_from_str() {
        struct TestCase {
            input: &'static str,
            expected: Result<Timeframe, UnknownTimeframe>,
        }

        let tests = vec![
            TestCase {
                // TC0: canonical upstream interval
                input: "5min",
                expected: Ok(Timeframe::FiveMinutes),
            },
            TestCase {
                // TC1: case and whitespace are tolerated
                input: " 1H ",
                expected: Ok(Timeframe::OneHour),
            },
            TestCase {
                // TC2: unsupported interval
                input: "1day",
                expected: Err(UnknownTimeframe("1day".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.parse::<Timeframe>();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_timeframe_serde_matches_display() {
        for timeframe in Timeframe::ALL {
            let json = serde_json::to_string(&timeframe).unwrap();
            assert_eq!(json, format!("\"{timeframe}\""));
            assert_eq!(Timeframe::from_u8(timeframe.as_u8()), timeframe);
        }
    }

    #[test]
    fn test_selector_swap_returns_previous() {
        let selector = TimeframeSelector::new(Timeframe::FiveMinutes);
        assert_eq!(selector.set(Timeframe::FourHours), Timeframe::FiveMinutes);
        assert_eq!(selector.active(), Timeframe::FourHours);
    }
}
