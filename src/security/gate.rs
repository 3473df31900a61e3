//! Request gate: the per-request defense pipeline.
//!
//! # State Machine
//! ```text
//! NEW → BLOCK_CHECK ──blocked──────────────→ DENIED (403, `blocked` event)
//!          │
//!          ▼
//!       RATE_CHECK ──over limit → block(short)→ DENIED (429, `attack` event)
//!          │
//!          ▼
//!       THREAT_SCAN ─matches → block(long)───→ DENIED (403, `threat` event)
//!          │
//!          ▼
//!       ADMITTED (no event)
//! ```
//!
//! # Design Decisions
//! - An already-blocked source never reaches the rate limiter or classifier
//! - Each store guards its own read-modify-write; the pipeline as a whole is not atomic
//! - Any internal error denies the request ("processing error"), never admits it
//! - Client-facing reasons name categories, never patterns

use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::loader::ConfigError;
use crate::config::validation::validate_config;
use crate::config::{BlockingConfig, ShieldConfig, StatsConfig, SweepConfig};
use crate::observability::metrics;
use crate::security::blocklist::{BlockRegistry, BlockedSource};
use crate::security::classifier::{PatternClassifier, RequestView, ThreatClassifier, ThreatMatch};
use crate::security::events::{EventDetails, EventLog, EventSource, SecurityEvent};
use crate::security::rate_limit::RateLimiter;
use crate::security::stats::{summarize, SecurityStats};
use crate::security::types::{Clock, EventKind, Severity, ShieldResult, SystemClock};

/// Reason returned when the pipeline itself fails.
pub const PROCESSING_ERROR: &str = "processing error";

/// How a request left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Admitted,
    Blocked,
    RateLimited,
    Threat,
    ProcessingError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Admitted => "admitted",
            Outcome::Blocked => "blocked",
            Outcome::RateLimited => "rate_limited",
            Outcome::Threat => "threat",
            Outcome::ProcessingError => "processing_error",
        }
    }
}

/// Per-request decision handed to the caller and downstream responders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub allowed: bool,
    pub outcome: Outcome,
    pub reason: String,
    pub matched_threats: Vec<ThreatMatch>,
    pub newly_blocked: bool,
    /// End of the source's block (epoch ms), when the verdict involves one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<u64>,
}

impl Verdict {
    fn admitted() -> Self {
        Self {
            allowed: true,
            outcome: Outcome::Admitted,
            reason: "ok".to_string(),
            matched_threats: Vec::new(),
            newly_blocked: false,
            blocked_until: None,
        }
    }

    fn denied(outcome: Outcome, reason: String, matched_threats: Vec<ThreatMatch>, newly_blocked: bool) -> Self {
        Self {
            allowed: false,
            outcome,
            reason,
            matched_threats,
            newly_blocked,
            blocked_until: None,
        }
    }

    fn until(mut self, until_ms: u64) -> Self {
        self.blocked_until = Some(until_ms);
        self
    }

    fn processing_error() -> Self {
        Self::denied(Outcome::ProcessingError, PROCESSING_ERROR.to_string(), Vec::new(), false)
    }
}

/// Reloadable part of the gate's configuration.
#[derive(Debug, Clone)]
struct GatePolicy {
    blocking: BlockingConfig,
    stats: StatsConfig,
    sweep: SweepConfig,
}

impl From<&ShieldConfig> for GatePolicy {
    fn from(config: &ShieldConfig) -> Self {
        Self {
            blocking: config.blocking.clone(),
            stats: config.stats.clone(),
            sweep: config.sweep.clone(),
        }
    }
}

/// Counts of entries removed by one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub blocks_removed: usize,
    pub rate_records_removed: usize,
}

/// The defense subsystem. Owns all four stores; create once and share by `Arc`.
pub struct SecurityMiddleware {
    blocks: BlockRegistry,
    limiter: RateLimiter,
    classifier: Box<dyn ThreatClassifier>,
    events: EventLog,
    policy: ArcSwap<GatePolicy>,
    clock: Arc<dyn Clock>,
}

impl SecurityMiddleware {
    /// Build from validated configuration, using the wall clock.
    ///
    /// An invalid configuration yields no gate at all.
    pub fn new(config: &ShieldConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &ShieldConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let classifier = PatternClassifier::builtin().map_err(ConfigError::Patterns)?;

        Ok(Self {
            blocks: BlockRegistry::new(),
            limiter: RateLimiter::new(config.rate_limit.clone()),
            classifier: Box::new(classifier),
            events: EventLog::new(config.event_log.capacity),
            policy: ArcSwap::from_pointee(GatePolicy::from(config)),
            clock,
        })
    }

    /// Replace the classifier.
    pub fn with_classifier(mut self, classifier: Box<dyn ThreatClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Apply a reloaded configuration. Per-source state is kept.
    ///
    /// On error the current policy stays in force.
    pub fn apply_config(&self, config: &ShieldConfig) -> Result<(), ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        self.limiter.set_limits(config.rate_limit.clone());
        let previous = self.policy.swap(Arc::new(GatePolicy::from(config)));
        if previous.sweep != config.sweep {
            tracing::info!(
                enabled = config.sweep.enabled,
                interval_secs = config.sweep.interval_secs,
                "Sweep policy changed, applies from the next pass"
            );
        }
        if config.event_log.capacity != self.events.capacity() {
            tracing::warn!(
                current = self.events.capacity(),
                requested = config.event_log.capacity,
                "Event log capacity changes take effect on restart"
            );
        }
        tracing::info!("Defense policy updated");
        Ok(())
    }

    /// Run the pipeline for one request.
    pub fn evaluate(&self, view: &RequestView) -> Verdict {
        let started = Instant::now();
        let now = self.clock.now_ms();

        let verdict = match self.run_pipeline(view, now) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::error!(source = %view.source, error = %e, "Request evaluation failed, denying");
                Verdict::processing_error()
            }
        };

        metrics::record_verdict(verdict.outcome.as_str(), started);
        verdict
    }

    fn run_pipeline(&self, view: &RequestView, now: u64) -> ShieldResult<Verdict> {
        let policy = self.policy.load();
        let source = view.source.as_str();

        // BLOCK_CHECK
        if let Some(record) = self.blocks.current_record(source).filter(|r| r.is_active(now)) {
            tracing::debug!(source = %source, until_ms = record.until_verify_time, "Blocked source denied");
            self.record(SecurityEvent::new(
                now,
                EventKind::Blocked,
                Severity::High,
                EventSource::from(view),
                EventDetails {
                    reason: format!("blocked source attempted access: {}", record.reason),
                    matched_pattern: None,
                    categories: Vec::new(),
                    blocked: true,
                },
            ))?;
            return Ok(Verdict::denied(
                Outcome::Blocked,
                format!("source is blocked: {}", record.reason),
                Vec::new(),
                false,
            )
            .until(record.until_verify_time));
        }

        // RATE_CHECK
        let decision = self.limiter.check(source, now);
        if let (false, Some(reason)) = (decision.allowed, decision.reason) {
            let record = self.blocks.block(
                source,
                reason.as_str(),
                policy.blocking.rate_limit_cooldown_ms,
                now,
            );
            tracing::warn!(
                source = %source,
                reason = reason.as_str(),
                offense_count = record.offense_count,
                until_ms = record.until_verify_time,
                "Rate limit exceeded, source blocked"
            );
            metrics::record_block("rate_limit");
            self.record(SecurityEvent::new(
                now,
                EventKind::Attack,
                Severity::High,
                EventSource::from(view),
                EventDetails {
                    reason: reason.as_str().to_string(),
                    matched_pattern: None,
                    categories: Vec::new(),
                    blocked: true,
                },
            ))?;
            return Ok(Verdict::denied(
                Outcome::RateLimited,
                reason.as_str().to_string(),
                Vec::new(),
                true,
            )
            .until(record.until_verify_time));
        }

        // THREAT_SCAN
        let matches = self.classifier.classify(view)?;
        if !matches.is_empty() {
            let labels: Vec<&str> = matches.iter().map(|m| m.category.label()).collect();
            let reason = format!("threats detected: {}", labels.join(", "));
            let record = self.blocks.block(
                source,
                &reason,
                policy.blocking.threat_cooldown_ms,
                now,
            );
            tracing::warn!(
                source = %source,
                categories = ?labels,
                offense_count = record.offense_count,
                until_ms = record.until_verify_time,
                "Threat detected, source blocked"
            );
            metrics::record_block("threat");
            self.record(SecurityEvent::new(
                now,
                EventKind::Threat,
                Severity::Critical,
                EventSource::from(view),
                EventDetails {
                    reason: reason.clone(),
                    matched_pattern: matches.first().map(|m| m.pattern_id.clone()),
                    categories: matches.iter().map(|m| m.category).collect(),
                    blocked: true,
                },
            ))?;
            return Ok(Verdict::denied(Outcome::Threat, reason, matches, true).until(record.until_verify_time));
        }

        tracing::trace!(source = %source, path = %view.path, "Request admitted");
        Ok(Verdict::admitted())
    }

    fn record(&self, event: SecurityEvent) -> ShieldResult<()> {
        let len = self.events.push(event)?;
        metrics::record_event_log_size(len);
        Ok(())
    }

    /// Record a `suspicious` event on behalf of a collaborator.
    /// Blocking state is left untouched.
    pub fn report_suspicious(&self, view: &RequestView, reason: &str) -> ShieldResult<SecurityEvent> {
        let event = SecurityEvent::new(
            self.clock.now_ms(),
            EventKind::Suspicious,
            Severity::Medium,
            EventSource::from(view),
            EventDetails {
                reason: reason.to_string(),
                matched_pattern: None,
                categories: Vec::new(),
                blocked: false,
            },
        );
        self.record(event.clone())?;
        Ok(event)
    }

    /// Summary over `window_ms`, or the configured default window.
    pub fn stats(&self, window_ms: Option<u64>) -> ShieldResult<SecurityStats> {
        let policy = self.policy.load();
        let window_ms = window_ms.unwrap_or(policy.stats.window_ms);
        let events = self.events.snapshot()?;
        Ok(summarize(
            &events,
            self.clock.now_ms(),
            window_ms,
            self.limiter.tracked_sources(),
            &policy.stats,
        ))
    }

    /// Most recent events, newest first, capped at the log capacity.
    pub fn recent_events(&self, limit: usize) -> ShieldResult<Vec<SecurityEvent>> {
        self.events.recent(limit.min(self.events.capacity()))
    }

    /// Sources whose block is still active.
    pub fn blocked_sources(&self) -> Vec<BlockedSource> {
        self.blocks.active(self.clock.now_ms())
    }

    /// Wipe the event log, block registry and rate limiter.
    pub fn clear(&self) -> ShieldResult<()> {
        self.events.clear()?;
        self.blocks.clear();
        self.limiter.clear();
        metrics::record_event_log_size(0);
        tracing::warn!("All defense state cleared");
        Ok(())
    }

    /// Drop stale registry entries according to the sweep policy.
    pub fn sweep(&self) -> SweepReport {
        let policy = self.policy.load();
        let now = self.clock.now_ms();
        let report = SweepReport {
            blocks_removed: self.blocks.sweep(now, policy.sweep.grace_ms, policy.sweep.max_offense_count),
            rate_records_removed: self.limiter.sweep(now),
        };
        metrics::record_swept("blocks", report.blocks_removed);
        metrics::record_swept("rate_records", report.rate_records_removed);
        metrics::record_blocked_sources(self.blocks.active_count(now));
        report
    }

    pub fn sweep_interval_secs(&self) -> u64 {
        self.policy.load().sweep.interval_secs
    }

    pub fn sweep_enabled(&self) -> bool {
        self.policy.load().sweep.enabled
    }

    pub fn block_registry(&self) -> &BlockRegistry {
        &self.blocks
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
