//! Rolling-window summaries over the event log.
//!
//! # Responsibilities
//! - Filter events to `[now - window, now]`
//! - Bucket them by threat category and by severity
//! - Rank sources by event count (ties: most recently seen first)
//! - Derive an overall status from the event count in the window
//!
//! # Design Decisions
//! - Computed on demand from a snapshot; nothing is pre-aggregated
//! - Rate-limit events are bucketed from their reason text, threat
//!   events from the categories recorded on them

use serde::Serialize;
use std::collections::HashMap;

use crate::config::StatsConfig;
use crate::security::events::SecurityEvent;
use crate::security::rate_limit::{BURST_EXCEEDED, SUSTAINED_EXCEEDED};
use crate::security::types::{Severity, ThreatCategory};

/// Overall threat level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShieldStatus {
    Secure,
    Alert,
    UnderAttack,
}

impl ShieldStatus {
    /// `secure` below `alert_threshold`, `under_attack` above
    /// `under_attack_threshold`, `alert` in between (inclusive).
    pub fn from_event_count(count: usize, config: &StatsConfig) -> Self {
        if count < config.alert_threshold {
            ShieldStatus::Secure
        } else if count <= config.under_attack_threshold {
            ShieldStatus::Alert
        } else {
            ShieldStatus::UnderAttack
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatCounts {
    pub sql_injection: u64,
    pub xss: u64,
    pub path_traversal: u64,
    pub scanner: u64,
    pub brute_force: u64,
    pub flood: u64,
    pub other: u64,
}

impl ThreatCounts {
    fn record(&mut self, event: &SecurityEvent) {
        if !event.details.categories.is_empty() {
            for category in &event.details.categories {
                match category {
                    ThreatCategory::SqlInjection => self.sql_injection += 1,
                    ThreatCategory::Xss => self.xss += 1,
                    ThreatCategory::PathTraversal => self.path_traversal += 1,
                    ThreatCategory::ScannerSignature => self.scanner += 1,
                }
            }
            return;
        }

        let reason = event.details.reason.as_str();
        if reason.contains(SUSTAINED_EXCEEDED) {
            self.brute_force += 1;
        } else if reason.contains(BURST_EXCEEDED) {
            self.flood += 1;
        } else {
            self.other += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl SeverityCounts {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offender {
    pub source: String,
    pub count: u64,
    pub last_seen: u64,
}

/// Summary returned by `GET stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStats {
    pub status: ShieldStatus,
    pub window_ms: u64,
    pub events_in_window: usize,
    pub total_requests_tracked: usize,
    pub blocked_in_window: usize,
    pub threats_by_category: ThreatCounts,
    pub threats_by_severity: SeverityCounts,
    pub top_offenders: Vec<Offender>,
}

/// Summarize `events` over the window ending at `now`.
///
/// `tracked_sources` is reported as-is (distinct sources known to the rate limiter).
pub fn summarize(
    events: &[SecurityEvent],
    now: u64,
    window_ms: u64,
    tracked_sources: usize,
    config: &StatsConfig,
) -> SecurityStats {
    let start = now.saturating_sub(window_ms);
    let in_window: Vec<&SecurityEvent> = events
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp <= now)
        .collect();

    let mut by_category = ThreatCounts::default();
    let mut by_severity = SeverityCounts::default();
    let mut offenders: HashMap<&str, (u64, u64)> = HashMap::new();
    let mut blocked = 0;

    for event in &in_window {
        by_category.record(event);
        by_severity.record(event.severity);
        if event.details.blocked {
            blocked += 1;
        }

        let entry = offenders.entry(event.source.address.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 = entry.1.max(event.timestamp);
    }

    let mut top_offenders: Vec<Offender> = offenders
        .into_iter()
        .map(|(source, (count, last_seen))| Offender {
            source: source.to_string(),
            count,
            last_seen,
        })
        .collect();
    top_offenders.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.source.cmp(&b.source))
    });
    top_offenders.truncate(config.top_offenders);

    SecurityStats {
        status: ShieldStatus::from_event_count(in_window.len(), config),
        window_ms,
        events_in_window: in_window.len(),
        total_requests_tracked: tracked_sources,
        blocked_in_window: blocked,
        threats_by_category: by_category,
        threats_by_severity: by_severity,
        top_offenders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::events::{EventDetails, EventSource};
    use crate::security::types::EventKind;

    fn event(address: &str, timestamp: u64, reason: &str, categories: Vec<ThreatCategory>) -> SecurityEvent {
        let (kind, severity) = if categories.is_empty() {
            (EventKind::Attack, Severity::High)
        } else {
            (EventKind::Threat, Severity::Critical)
        };
        SecurityEvent::new(
            timestamp,
            kind,
            severity,
            EventSource {
                address: address.into(),
                user_agent: None,
                method: "GET".into(),
                path: "/".into(),
            },
            EventDetails {
                reason: reason.into(),
                matched_pattern: None,
                categories,
                blocked: true,
            },
        )
    }

    #[test]
    fn test_window_filter() {
        let events = vec![
            event("a", 1_000, SUSTAINED_EXCEEDED, vec![]),
            event("a", 50_000, SUSTAINED_EXCEEDED, vec![]),
            event("b", 60_000, BURST_EXCEEDED, vec![]),
        ];
        let stats = summarize(&events, 60_000, 20_000, 0, &StatsConfig::default());
        assert_eq!(stats.events_in_window, 2);
        assert_eq!(stats.threats_by_category.brute_force, 1);
        assert_eq!(stats.threats_by_category.flood, 1);
        assert_eq!(stats.blocked_in_window, 2);
    }

    #[test]
    fn test_category_and_severity_buckets() {
        let events = vec![
            event("a", 10, "threats", vec![ThreatCategory::SqlInjection, ThreatCategory::Xss]),
            event("a", 20, "threats", vec![ThreatCategory::ScannerSignature]),
            event("b", 30, "blocked source attempted access", vec![]),
        ];
        let stats = summarize(&events, 100, 1_000, 7, &StatsConfig::default());
        let counts = &stats.threats_by_category;
        assert_eq!(counts.sql_injection, 1);
        assert_eq!(counts.xss, 1);
        assert_eq!(counts.scanner, 1);
        assert_eq!(counts.other, 1);
        assert_eq!(stats.threats_by_severity.critical, 2);
        assert_eq!(stats.threats_by_severity.high, 1);
        assert_eq!(stats.total_requests_tracked, 7);
    }

    #[test]
    fn test_top_offenders_ranking() {
        let events = vec![
            event("x", 10, "r", vec![]),
            event("y", 20, "r", vec![]),
            event("y", 30, "r", vec![]),
            event("z", 40, "r", vec![]),
        ];
        let stats = summarize(&events, 100, 1_000, 0, &StatsConfig::default());
        let ranked: Vec<_> = stats
            .top_offenders
            .iter()
            .map(|o| (o.source.as_str(), o.count, o.last_seen))
            .collect();
        // x and z tie on count; z was seen more recently.
        assert_eq!(ranked, vec![("y", 2, 30), ("z", 1, 40), ("x", 1, 10)]);
    }

    #[test]
    fn test_top_offenders_cap() {
        let events: Vec<_> = (0..15u64)
            .map(|i| event(&format!("10.0.0.{}", i), i, "r", vec![]))
            .collect();
        let stats = summarize(&events, 100, 1_000, 0, &StatsConfig::default());
        assert_eq!(stats.top_offenders.len(), 10);
    }

    #[test]
    fn test_status_boundaries() {
        let config = StatsConfig::default();
        assert_eq!(ShieldStatus::from_event_count(0, &config), ShieldStatus::Secure);
        assert_eq!(ShieldStatus::from_event_count(9, &config), ShieldStatus::Secure);
        assert_eq!(ShieldStatus::from_event_count(10, &config), ShieldStatus::Alert);
        assert_eq!(ShieldStatus::from_event_count(100, &config), ShieldStatus::Alert);
        assert_eq!(ShieldStatus::from_event_count(101, &config), ShieldStatus::UnderAttack);
    }

    #[test]
    fn test_serialized_field_names() {
        let stats = summarize(&[], 0, 1_000, 0, &StatsConfig::default());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["status"], "secure");
        for key in [
            "totalRequestsTracked",
            "blockedInWindow",
            "threatsByCategory",
            "threatsBySeverity",
            "topOffenders",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
