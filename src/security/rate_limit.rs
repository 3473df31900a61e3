//! Per-source fixed-window rate limiter.
//!
//! One counter window per source. A window opens on the first request and
//! resets once it is older than `window_ms`. Two thresholds apply inside a
//! window: the sustained limit for the whole window, and the burst limit for
//! the first `burst_window_ms` of it. The sustained limit is checked first.
//!
//! This is a fixed window, not a sliding log: a burst straddling the window
//! boundary can pass up to twice the sustained limit.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::config::RateLimitConfig;

/// Reason given when the sustained limit is exceeded.
pub const SUSTAINED_EXCEEDED: &str = "sustained rate exceeded";
/// Reason given when the burst limit is exceeded.
pub const BURST_EXCEEDED: &str = "burst rate exceeded (possible flood)";

/// Counter state for a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub count: u32,
    pub window_start: u64,
}

/// Which limit rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    Sustained,
    Burst,
}

impl RateLimitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitReason::Sustained => SUSTAINED_EXCEEDED,
            RateLimitReason::Burst => BURST_EXCEEDED,
        }
    }
}

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub reason: Option<RateLimitReason>,
}

impl RateDecision {
    fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    fn deny(reason: RateLimitReason) -> Self {
        Self { allowed: false, reason: Some(reason) }
    }
}

/// Fixed-window rate limiter keyed by source.
pub struct RateLimiter {
    records: DashMap<String, RateRecord>,
    limits: ArcSwap<RateLimitConfig>,
}

impl RateLimiter {
    pub fn new(limits: RateLimitConfig) -> Self {
        Self {
            records: DashMap::new(),
            limits: ArcSwap::from_pointee(limits),
        }
    }

    /// Count a request from `source` and decide whether it may pass.
    pub fn check(&self, source: &str, now: u64) -> RateDecision {
        let limits = self.limits.load();

        // The shard lock is held for the whole read-modify-write.
        let mut entry = self
            .records
            .entry(source.to_string())
            .or_insert(RateRecord { count: 0, window_start: now });
        let record = entry.value_mut();

        if record.count == 0 || now.saturating_sub(record.window_start) > limits.window_ms {
            record.count = 1;
            record.window_start = now;
            return RateDecision::allow();
        }

        record.count = record.count.saturating_add(1);

        if record.count > limits.sustained_limit {
            return RateDecision::deny(RateLimitReason::Sustained);
        }

        if now.saturating_sub(record.window_start) < limits.burst_window_ms
            && record.count > limits.burst_limit
        {
            return RateDecision::deny(RateLimitReason::Burst);
        }

        RateDecision::allow()
    }

    /// Current counter state for a source, if it has been seen.
    pub fn current(&self, source: &str) -> Option<RateRecord> {
        self.records.get(source).map(|r| *r.value())
    }

    /// Number of distinct sources with a counter.
    pub fn tracked_sources(&self) -> usize {
        self.records.len()
    }

    /// Replace the limits; existing windows are kept.
    pub fn set_limits(&self, limits: RateLimitConfig) {
        self.limits.store(Arc::new(limits));
    }

    pub fn limits(&self) -> Arc<RateLimitConfig> {
        self.limits.load_full()
    }

    /// Drop counters whose window has already elapsed. Returns the number removed.
    pub fn sweep(&self, now: u64) -> usize {
        let window_ms = self.limits.load().window_ms;
        let before = self.records.len();
        self.records
            .retain(|_, record| now.saturating_sub(record.window_start) <= window_ms);
        before.saturating_sub(self.records.len())
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}
