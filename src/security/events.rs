//! Security events and the bounded event log.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

use crate::security::classifier::RequestView;
use crate::security::types::{EventKind, Severity, ShieldError, ShieldResult, ThreatCategory};

/// Default ring buffer capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub address: String,
    pub user_agent: Option<String>,
    pub method: String,
    pub path: String,
}

impl From<&RequestView> for EventSource {
    fn from(view: &RequestView) -> Self {
        Self {
            address: view.source.clone(),
            user_agent: view.user_agent.clone(),
            method: view.method.clone(),
            path: view.path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub reason: String,
    /// Id of the first matched pattern, for operators.
    pub matched_pattern: Option<String>,
    /// Every category matched by the request.
    pub categories: Vec<ThreatCategory>,
    pub blocked: bool,
}

/// An immutable record of something the gate (or a collaborator) observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub kind: EventKind,
    pub severity: Severity,
    pub source: EventSource,
    pub details: EventDetails,
}

impl SecurityEvent {
    pub fn new(
        timestamp: u64,
        kind: EventKind,
        severity: Severity,
        source: EventSource,
        details: EventDetails,
    ) -> Self {
        Self {
            id: format!("sec_{}", Uuid::new_v4().simple()),
            timestamp,
            kind,
            severity,
            source,
            details,
        }
    }
}

/// Fixed-capacity, insertion-ordered event buffer. Oldest events are evicted first.
#[derive(Debug)]
pub struct EventLog {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evicting the oldest when full. Returns the new length.
    pub fn push(&self, event: SecurityEvent) -> ShieldResult<usize> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| ShieldError::StoreUnavailable("event log"))?;
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        Ok(events.len())
    }

    /// Up to `limit` events, most recent first.
    pub fn recent(&self, limit: usize) -> ShieldResult<Vec<SecurityEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| ShieldError::StoreUnavailable("event log"))?;
        Ok(events.iter().rev().take(limit).cloned().collect())
    }

    /// All events, oldest first.
    pub fn snapshot(&self) -> ShieldResult<Vec<SecurityEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| ShieldError::StoreUnavailable("event log"))?;
        Ok(events.iter().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> ShieldResult<()> {
        self.events
            .lock()
            .map_err(|_| ShieldError::StoreUnavailable("event log"))?
            .clear();
        Ok(())
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(timestamp: u64, path: &str) -> SecurityEvent {
        SecurityEvent::new(
            timestamp,
            EventKind::Attack,
            Severity::High,
            EventSource {
                address: "9.9.9.9".into(),
                user_agent: None,
                method: "GET".into(),
                path: path.into(),
            },
            EventDetails {
                reason: "test".into(),
                matched_pattern: None,
                categories: Vec::new(),
                blocked: true,
            },
        )
    }

    #[test]
    fn test_ids_are_unique() {
        let a = event(0, "/");
        let b = event(0, "/");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("sec_"));
    }

    #[test]
    fn test_eviction_is_fifo() {
        let log = EventLog::new(1000);
        for i in 0..1001u64 {
            log.push(event(i, &format!("/{}", i))).unwrap();
        }
        assert_eq!(log.len(), 1000);

        let all = log.snapshot().unwrap();
        assert_eq!(all.first().unwrap().timestamp, 1);
        assert_eq!(all.last().unwrap().timestamp, 1000);
        assert!(all.iter().all(|e| e.source.path != "/0"));
    }

    #[test]
    fn test_recent_is_newest_first() {
        let log = EventLog::new(10);
        for i in 0..5u64 {
            log.push(event(i, "/")).unwrap();
        }
        let recent = log.recent(3).unwrap();
        let stamps: Vec<_> = recent.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![4, 3, 2]);
        assert_eq!(log.recent(50).unwrap().len(), 5);
    }

    #[test]
    fn test_clear() {
        let log = EventLog::new(10);
        log.push(event(0, "/")).unwrap();
        log.clear().unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(event(42, "/x")).unwrap();
        assert_eq!(json["kind"], "attack");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["source"]["address"], "9.9.9.9");
        assert_eq!(json["details"]["blocked"], true);
        assert!(json["details"]["matchedPattern"].is_null());
    }
}
