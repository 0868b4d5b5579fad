//! Rolling per-minute call budget for the upstream.
//!
//! The upstream enforces a hard cap of calls per trailing minute. [`QuotaTracker`] keeps the
//! timestamps of every call made inside the trailing window and admits a new call only while
//! fewer than `limit` remain, where `limit` sits one credit below the hard cap.

use chrono::Utc;
use parking_lot::Mutex;
use std::{collections::VecDeque, time::Duration};
use tracing::trace;

/// Hard per-minute call cap enforced by the upstream.
pub const UPSTREAM_HARD_CAP: usize = 8;

/// Default local budget, one below [`UPSTREAM_HARD_CAP`] as a safety margin.
pub const DEFAULT_QUOTA_LIMIT: usize = UPSTREAM_HARD_CAP - 1;

/// Length of the trailing quota window.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window call counter shared by the upstream client and status reporting.
#[derive(Debug)]
pub struct QuotaTracker {
    limit: usize,
    window_ms: i64,
    calls: Mutex<VecDeque<i64>>,
}

impl QuotaTracker {
    /// Construct a tracker admitting at most `limit` calls per [`QUOTA_WINDOW`].
    pub fn new(limit: usize) -> Self {
        Self::with_window(limit, QUOTA_WINDOW)
    }

    /// Construct a tracker with a custom window length.
    pub fn with_window(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            calls: Mutex::new(VecDeque::with_capacity(limit + 1)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms as u64)
    }

    /// Purge expired calls and report whether another call fits in the budget.
    ///
    /// Does not record anything; a `true` answer must be followed by exactly one
    /// [`record`](Self::record). Prefer [`try_admit`](Self::try_admit), which cannot race.
    pub fn admit(&self) -> bool {
        self.admit_at(now_ms())
    }

    pub fn admit_at(&self, now_ms: i64) -> bool {
        let mut calls = self.calls.lock();
        self.purge(&mut calls, now_ms);
        calls.len() < self.limit
    }

    /// Append a call made at the current time.
    pub fn record(&self) {
        self.record_at(now_ms())
    }

    pub fn record_at(&self, now_ms: i64) {
        let mut calls = self.calls.lock();
        // Keep the window non-decreasing even if the wall clock steps back
        let stamp = calls.back().map_or(now_ms, |last| now_ms.max(*last));
        calls.push_back(stamp);
    }

    /// Atomically purge, check the budget and, if admitted, record the call.
    pub fn try_admit(&self) -> bool {
        self.try_admit_at(now_ms())
    }

    pub fn try_admit_at(&self, now_ms: i64) -> bool {
        let mut calls = self.calls.lock();
        self.purge(&mut calls, now_ms);

        if calls.len() >= self.limit {
            trace!(used = calls.len(), limit = self.limit, "quota exhausted");
            return false;
        }

        let stamp = calls.back().map_or(now_ms, |last| now_ms.max(*last));
        calls.push_back(stamp);
        true
    }

    /// Number of calls inside the trailing window.
    pub fn used(&self) -> usize {
        self.used_at(now_ms())
    }

    pub fn used_at(&self, now_ms: i64) -> usize {
        let mut calls = self.calls.lock();
        self.purge(&mut calls, now_ms);
        calls.len()
    }

    /// Calls still available inside the trailing window.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used())
    }

    fn purge(&self, calls: &mut VecDeque<i64>, now_ms: i64) {
        let cutoff = now_ms - self.window_ms;
        while let Some(front) = calls.front() {
            if *front <= cutoff {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA_LIMIT)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
