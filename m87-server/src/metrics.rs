//! Telemetry record shape (spec §3, `DynamicWeightMetrics`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling window durations, in days, shortest first: 7/14/30/90/180.
pub const WINDOW_DURATIONS_DAYS: [i64; 5] = [7, 14, 30, 90, 180];

/// One rolling window's counters plus the epoch it started counting from.
///
/// Window rotation is coarse: a single bucket per window, reset wholesale
/// once its age exceeds the window's duration ("drop the bucket, start a
/// new epoch" read literally, not a multi-bucket ring buffer).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowCounters {
    pub requests: u64,
    pub successes: u64,
    pub epoch_start: DateTime<Utc>,
}

impl WindowCounters {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            requests: 0,
            successes: 0,
            epoch_start: now,
        }
    }

    fn rotate_if_expired(&mut self, now: DateTime<Utc>, duration_days: i64) {
        let age = now.signed_duration_since(self.epoch_start);
        if age >= chrono::Duration::days(duration_days) {
            self.requests = 0;
            self.successes = 0;
            self.epoch_start = now;
        }
    }
}

/// One record per (aggregate_group_id, sub_group_id) or per
/// (group_id, source_model, target_key). See spec §3 for invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicWeightMetrics {
    /// Windows ordered 7d/14d/30d/90d/180d.
    pub windows: [WindowCounters; 5],
    pub consecutive_failures: u32,
    pub request_count: u64,
    pub success_count: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl DynamicWeightMetrics {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            windows: [WindowCounters::new(now); 5],
            consecutive_failures: 0,
            request_count: 0,
            success_count: 0,
            last_success_at: None,
            last_failure_at: None,
        }
    }

    /// `WindowStartAt` of the spec's data model: the epoch of the shortest
    /// (7-day) window, used to identify the current short-window epoch.
    pub fn window_start_at(&self) -> DateTime<Utc> {
        self.windows[0].epoch_start
    }

    pub fn requests(&self, window_index: usize) -> u64 {
        self.windows[window_index].requests
    }

    pub fn successes(&self, window_index: usize) -> u64 {
        self.windows[window_index].successes
    }

    fn rotate(&mut self, now: DateTime<Utc>) {
        for (window, duration_days) in self.windows.iter_mut().zip(WINDOW_DURATIONS_DAYS) {
            window.rotate_if_expired(now, duration_days);
        }
    }

    /// Heals the invariant violation described in spec §3: a non-zero
    /// lifetime success count with no recorded `last_success_at` means the
    /// record predates this field or was corrupted upstream. Since the
    /// true timestamp is unrecoverable, healing stamps it to `now` rather
    /// than leaving the inconsistency in place.
    fn heal(&mut self, now: DateTime<Utc>) {
        if self.success_count > 0 && self.last_success_at.is_none() {
            self.last_success_at = Some(now);
        }
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.heal(now);
        self.rotate(now);
        for window in &mut self.windows {
            window.requests += 1;
            window.successes += 1;
        }
        self.request_count += 1;
        self.success_count += 1;
        self.consecutive_failures = 0;
        self.last_success_at = Some(now);
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.heal(now);
        self.rotate(now);
        for window in &mut self.windows {
            window.requests += 1;
        }
        self.request_count += 1;
        self.consecutive_failures += 1;
        self.last_failure_at = Some(now);
    }

    pub fn is_pristine(&self) -> bool {
        self.request_count == 0 && self.last_failure_at.is_none()
    }
}
