// src/engine/stats.rs

//! Caller-owned counters and per-user rate limiting.
//!
//! Neither type is global: the front-end creates them and passes them by
//! reference to whatever drives jobs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::CooldownConfig;

use super::runner::JobResult;

/// Success/failure tallies across jobs.
#[derive(Debug, Default)]
pub struct RunnerStats {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl StatsSnapshot {
    /// Percentage of successful jobs; `0.0` before any job ran.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }
}

impl RunnerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: &JobResult) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if result.is_success() {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.snapshot().success_rate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    Ready,
    /// Still cooling down for this long.
    Wait(Duration),
}

/// Minimum spacing between jobs from the same user. Admins are exempt.
#[derive(Debug)]
pub struct CooldownTable {
    window: Duration,
    admins: Vec<String>,
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl CooldownTable {
    pub fn new(window: Duration, admins: Vec<String>) -> Self {
        Self {
            window,
            admins,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &CooldownConfig) -> Self {
        Self::new(cfg.window, cfg.admins.clone())
    }

    /// Check `user` and, when ready, start a new window for them.
    pub fn try_acquire(&self, user: &str) -> CooldownStatus {
        self.try_acquire_at(user, Instant::now())
    }

    pub fn try_acquire_at(&self, user: &str, now: Instant) -> CooldownStatus {
        if self.admins.iter().any(|a| a == user) {
            return CooldownStatus::Ready;
        }

        let mut last_seen = self.lock_last_seen();
        // Expired windows carry no state.
        last_seen.retain(|_, t| now.saturating_duration_since(*t) < self.window);
        if let Some(prev) = last_seen.get(user) {
            let since = now.saturating_duration_since(*prev);
            if since < self.window {
                return CooldownStatus::Wait(self.window - since);
            }
        }
        last_seen.insert(user.to_string(), now);
        CooldownStatus::Ready
    }

    /// Users currently inside a window, as of the last acquire.
    pub fn tracked_users(&self) -> usize {
        self.lock_last_seen().len()
    }

    fn lock_last_seen(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
