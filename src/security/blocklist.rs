//! Block registry with lazy expiry.
//!
//! # Responsibilities
//! - Record per-source blocks with an expiry timestamp and reason
//! - Count every block ever issued to a source (lifetime offense count)
//! - Answer "is this source blocked right now" without mutating anything
//!
//! # Design Decisions
//! - Expiry is observed, not enforced: no timer deletes records, so an
//!   expired record stays queryable and keeps its offense count
//! - Re-blocking overwrites expiry and reason and increments the count,
//!   whether or not the previous block had expired
//! - Memory is bounded by the sweeper, which only drops long-expired,
//!   low-offense records

use dashmap::DashMap;
use serde::Serialize;

/// Block state for a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    /// The source is blocked while `now < until_verify_time`.
    pub until_verify_time: u64,
    pub offense_count: u32,
    pub reason: String,
}

impl BlockRecord {
    pub fn is_active(&self, now: u64) -> bool {
        now < self.until_verify_time
    }
}

/// A currently active block, as exposed on the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedSource {
    pub source: String,
    pub until_verify_time: u64,
    pub offense_count: u32,
    pub reason: String,
}

/// Concurrent block registry keyed by source.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    records: DashMap<String, BlockRecord>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff a record exists and has not expired. Pure read.
    pub fn is_blocked(&self, source: &str, now: u64) -> bool {
        self.records
            .get(source)
            .map(|r| r.is_active(now))
            .unwrap_or(false)
    }

    /// Issue a block for `duration_ms`, returning the resulting record.
    pub fn block(&self, source: &str, reason: &str, duration_ms: u64, now: u64) -> BlockRecord {
        let until_verify_time = now.saturating_add(duration_ms);

        let entry = self
            .records
            .entry(source.to_string())
            .and_modify(|record| {
                record.offense_count = record.offense_count.saturating_add(1);
                record.until_verify_time = until_verify_time;
                record.reason = reason.to_string();
            })
            .or_insert_with(|| BlockRecord {
                until_verify_time,
                offense_count: 1,
                reason: reason.to_string(),
            });

        entry.value().clone()
    }

    /// The stored record for a source, expired or not.
    pub fn current_record(&self, source: &str) -> Option<BlockRecord> {
        self.records.get(source).map(|r| r.value().clone())
    }

    /// All records still active at `now`, latest expiry first.
    pub fn active(&self, now: u64) -> Vec<BlockedSource> {
        let mut active: Vec<BlockedSource> = self
            .records
            .iter()
            .filter(|r| r.value().is_active(now))
            .map(|r| BlockedSource {
                source: r.key().clone(),
                until_verify_time: r.value().until_verify_time,
                offense_count: r.value().offense_count,
                reason: r.value().reason.clone(),
            })
            .collect();
        active.sort_by(|a, b| {
            b.until_verify_time
                .cmp(&a.until_verify_time)
                .then_with(|| a.source.cmp(&b.source))
        });
        active
    }

    /// Number of active blocks at `now`.
    pub fn active_count(&self, now: u64) -> usize {
        self.records.iter().filter(|r| r.value().is_active(now)).count()
    }

    /// Total number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop records that expired more than `grace_ms` ago and whose offense
    /// count is at most `max_offense_count`. Returns the number removed.
    pub fn sweep(&self, now: u64, grace_ms: u64, max_offense_count: u32) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| {
            let long_expired = now >= record.until_verify_time.saturating_add(grace_ms);
            !(long_expired && record.offense_count <= max_offense_count)
        });
        before.saturating_sub(self.records.len())
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_source_is_not_blocked() {
        let registry = BlockRegistry::new();
        assert!(!registry.is_blocked("1.1.1.1", 0));
        assert!(registry.current_record("1.1.1.1").is_none());
    }

    #[test]
    fn test_block_and_expiry_boundary() {
        let registry = BlockRegistry::new();
        let record = registry.block("1.1.1.1", "flood", 1_000, 10_000);
        assert_eq!(record.offense_count, 1);
        assert_eq!(record.until_verify_time, 11_000);

        assert!(registry.is_blocked("1.1.1.1", 10_999));
        assert!(!registry.is_blocked("1.1.1.1", 11_000));
    }

    #[test]
    fn test_expired_record_stays_queryable() {
        let registry = BlockRegistry::new();
        registry.block("2.2.2.2", "threat", 100, 0);
        assert!(!registry.is_blocked("2.2.2.2", 500));

        let record = registry.current_record("2.2.2.2").unwrap();
        assert_eq!(record.offense_count, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reblock_increments_offense_count() {
        let registry = BlockRegistry::new();
        registry.block("3.3.3.3", "first", 100, 0);

        // Still blocked: overwrite anyway.
        let record = registry.block("3.3.3.3", "second", 100, 50);
        assert_eq!(record.offense_count, 2);
        assert_eq!(record.until_verify_time, 150);
        assert_eq!(record.reason, "second");

        // Expired: count carries over.
        let record = registry.block("3.3.3.3", "third", 100, 1_000);
        assert_eq!(record.offense_count, 3);
    }

    #[test]
    fn test_active_listing() {
        let registry = BlockRegistry::new();
        registry.block("a", "r", 100, 0);
        registry.block("b", "r", 1_000, 0);
        registry.block("c", "r", 5_000, 0);

        let active = registry.active(500);
        let sources: Vec<_> = active.iter().map(|b| b.source.as_str()).collect();
        assert_eq!(sources, vec!["c", "b"]);
        assert_eq!(registry.active_count(500), 2);
    }

    #[test]
    fn test_sweep_keeps_repeat_offenders() {
        let registry = BlockRegistry::new();
        registry.block("once", "r", 100, 0);
        registry.block("twice", "r", 100, 0);
        registry.block("twice", "r", 100, 0);
        registry.block("active", "r", 100_000, 0);

        let removed = registry.sweep(10_000, 1_000, 1);
        assert_eq!(removed, 1);
        assert!(registry.current_record("once").is_none());
        assert!(registry.current_record("twice").is_some());
        assert!(registry.current_record("active").is_some());
    }

    #[test]
    fn test_sweep_respects_grace() {
        let registry = BlockRegistry::new();
        registry.block("recent", "r", 100, 0);
        assert_eq!(registry.sweep(500, 1_000, 1), 0);
        assert_eq!(registry.sweep(1_100, 1_000, 1), 1);
    }
}
