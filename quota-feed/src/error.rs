use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of an upstream call that did not produce usable data.
///
/// None of these are fatal: the [`PollScheduler`](crate::scheduler::PollScheduler) absorbs every
/// variant identically by skipping the tick and leaving the cache untouched.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum UpstreamError {
    #[error("rate limited: local quota of {limit} calls per window exhausted")]
    RateLimited { limit: usize },

    #[error("upstream rejected request (code {code:?}): {message}")]
    Rejected { code: Option<u16>, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl UpstreamError {
    /// Determine if the error was produced locally without consuming upstream quota.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }

    /// Determine if the error represents a call that reached upstream and consumed quota.
    #[allow(clippy::match_like_matches_macro)]
    pub fn consumed_quota(&self) -> bool {
        match self {
            UpstreamError::RateLimited { .. } => false,
            _ => true,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(error: reqwest::Error) -> Self {
        // Strip the URL, it carries the api key as a query parameter
        Self::Transport(error.without_url().to_string())
    }
}

/// All errors generated by the `quota-feed` control surface.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Error)]
pub enum FeedError {
    #[error("poll scheduler has terminated")]
    SchedulerTerminated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_consumed_quota() {
        struct TestCase {
            input: UpstreamError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: local denial never reaches upstream
                input: UpstreamError::RateLimited { limit: 7 },
                expected: false,
            },
            TestCase {
                // TC1: application level rejection already spent a credit
                input: UpstreamError::Rejected {
                    code: Some(429),
                    message: "You have run out of API credits".to_string(),
                },
                expected: true,
            },
            TestCase {
                // TC2: transport failures are counted as well
                input: UpstreamError::Transport("operation timed out".to_string()),
                expected: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.consumed_quota();
            assert_eq!(actual, test.expected, "TC{} failed", index);
            assert_eq!(
                test.input.is_rate_limited(),
                !test.expected,
                "TC{} failed",
                index
            );
        }
    }
}
