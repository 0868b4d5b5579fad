use crate::timeframe::Timeframe;
use std::fmt::Display;

/// What a single scheduler tick polls.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PollTarget {
    Price,
    Candles {
        timeframe: Timeframe,
        /// `true` when `timeframe` was the active timeframe at planning time.
        foreground: bool,
    },
}

impl Display for PollTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollTarget::Price => write!(f, "price"),
            PollTarget::Candles {
                timeframe,
                foreground: true,
            } => write!(f, "candles({timeframe})"),
            PollTarget::Candles {
                timeframe,
                foreground: false,
            } => write!(f, "background candles({timeframe})"),
        }
    }
}

/// Round-robin cursor over every [`Timeframe`] except the active one.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct BackgroundRotation {
    cursor: usize,
}

impl BackgroundRotation {
    /// Next background [`Timeframe`], skipping `active`.
    ///
    /// Every non-active timeframe is returned once per `Timeframe::ALL.len() - 1` calls while
    /// the active timeframe is unchanged.
    pub fn next(&mut self, active: Timeframe) -> Option<Timeframe> {
        let len = Timeframe::ALL.len();

        for _ in 0..len {
            let candidate = Timeframe::ALL[self.cursor % len];
            self.cursor = (self.cursor + 1) % len;

            if candidate != active {
                return Some(candidate);
            }
        }

        None
    }
}

/// Decide what tick number `tick` (starting at 1) polls.
///
/// Odd ticks poll price. Even ticks poll the active timeframe's candles, except every
/// `background_every`th tick which refreshes a background timeframe instead. A
/// `background_every` of zero disables background refresh.
pub fn plan(
    tick: u64,
    active: Timeframe,
    rotation: &mut BackgroundRotation,
    background_every: u64,
) -> PollTarget {
    if tick % 2 == 1 {
        return PollTarget::Price;
    }

    if background_every > 0 && tick % background_every == 0 {
        if let Some(timeframe) = rotation.next(active) {
            return PollTarget::Candles {
                timeframe,
                foreground: false,
            };
        }
    }

    PollTarget::Candles {
        timeframe: active,
        foreground: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan() {
        struct TestCase {
            tick: u64,
            expected: PollTarget,
        }

        let active = Timeframe::FiveMinutes;
        let foreground = PollTarget::Candles {
            timeframe: active,
            foreground: true,
        };

        let tests = vec![
            TestCase {
                // TC0: first tick polls price
                tick: 1,
                expected: PollTarget::Price,
            },
            TestCase {
                // TC1: even tick polls active candles
                tick: 2,
                expected: foreground,
            },
            TestCase {
                // TC2: odd tick polls price
                tick: 3,
                expected: PollTarget::Price,
            },
            TestCase {
                // TC3: even tick polls active candles
                tick: 4,
                expected: foreground,
            },
            TestCase {
                // TC4: sixth tick refreshes the first background timeframe
                tick: 6,
                expected: PollTarget::Candles {
                    timeframe: Timeframe::OneMinute,
                    foreground: false,
                },
            },
            TestCase {
                // TC5: multiple of six but odd still polls price
                tick: 9,
                expected: PollTarget::Price,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut rotation = BackgroundRotation::default();
            let actual = plan(test.tick, active, &mut rotation, 6);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_plan_without_background_refresh() {
        let mut rotation = BackgroundRotation::default();

        assert_eq!(
            plan(6, Timeframe::OneHour, &mut rotation, 0),
            PollTarget::Candles {
                timeframe: Timeframe::OneHour,
                foreground: true,
            }
        );
        assert_eq!(rotation, BackgroundRotation::default());
    }

    #[test]
    fn test_rotation_visits_every_non_active_timeframe() {
        let mut rotation = BackgroundRotation::default();
        let active = Timeframe::FifteenMinutes;

        let visited = (0..Timeframe::ALL.len() - 1)
            .filter_map(|_| rotation.next(active))
            .collect::<Vec<_>>();

        assert_eq!(
            visited,
            vec![
                Timeframe::OneMinute,
                Timeframe::FiveMinutes,
                Timeframe::ThirtyMinutes,
                Timeframe::OneHour,
                Timeframe::FourHours,
            ]
        );

        // Wraps around
        assert_eq!(rotation.next(active), Some(Timeframe::OneMinute));
    }

    #[test]
    fn test_rotation_skips_newly_active_timeframe() {
        let mut rotation = BackgroundRotation::default();

        assert_eq!(rotation.next(Timeframe::FiveMinutes), Some(Timeframe::OneMinute));
        // Active switched to the next candidate in line
        assert_eq!(
            rotation.next(Timeframe::FiveMinutes),
            Some(Timeframe::FifteenMinutes)
        );
        assert_eq!(
            rotation.next(Timeframe::ThirtyMinutes),
            Some(Timeframe::OneHour)
        );
    }
}
