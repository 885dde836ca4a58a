// ===============================
// src/ratelimit.rs
// ===============================
//
// Sliding-window admission control per submitter. Timestamps are kept in
// millis; the critical section is short and never crosses an .await, so a
// single map lock is enough at bot traffic volumes.
//
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use ahash::AHashMap as HashMap;
use chrono::Utc;

use crate::domain::SubmitterId;

#[derive(Debug)]
pub struct RateLimiter {
    max: usize,
    window_ms: i64,
    windows: Mutex<HashMap<SubmitterId, VecDeque<i64>>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window_ms: window.as_millis() as i64,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or deny `id` right now. Denial records nothing.
    pub fn check(&self, id: SubmitterId) -> bool {
        self.check_at(id, Utc::now().timestamp_millis())
    }

    pub(crate) fn check_at(&self, id: SubmitterId, now_ms: i64) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");
        let entries = windows.entry(id).or_default();

        // prune everything that slid out of the trailing window
        while entries.front().is_some_and(|&t| now_ms - t >= self.window_ms) {
            entries.pop_front();
        }

        if entries.len() < self.max {
            entries.push_back(now_ms);
            true
        } else {
            false
        }
    }

    /// Drop a submitter's window (session destroyed or evicted).
    pub fn forget(&self, id: SubmitterId) {
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");
        windows.remove(&id);
    }
}
