//! Shared types, error definitions and the clock abstraction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Category of a detected threat.
///
/// Declaration order is the order the classifier reports matches in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatCategory {
    SqlInjection,
    Xss,
    PathTraversal,
    ScannerSignature,
}

impl ThreatCategory {
    /// Human-readable label, safe to return to clients.
    pub fn label(&self) -> &'static str {
        match self {
            ThreatCategory::SqlInjection => "SQL injection",
            ThreatCategory::Xss => "XSS",
            ThreatCategory::PathTraversal => "path traversal",
            ThreatCategory::ScannerSignature => "scanner signature",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity attached to a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Kind of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Attack,
    Suspicious,
    Blocked,
    Threat,
}

/// Errors raised inside the request pipeline.
///
/// None of these reach the client: the gate turns every one of them
/// into a DENIED verdict.
#[derive(Debug, Error)]
pub enum ShieldError {
    /// A shared store could not be accessed (e.g. a poisoned lock).
    #[error("store unavailable: {0}")]
    StoreUnavailable(&'static str),

    /// The classifier failed to produce a result.
    #[error("classification failed: {0}")]
    Classification(String),
}

/// Result type for pipeline operations.
pub type ShieldResult<T> = Result<T, ShieldError>;

/// Source of "now" for every time-dependent decision.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually driven clock for tests and replay tooling.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
