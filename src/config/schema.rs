//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the shield.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShieldConfig {
    /// Public listener (protected traffic).
    pub listener: ListenerConfig,

    /// The protected service admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Sustained and burst rate thresholds.
    pub rate_limit: RateLimitConfig,

    /// Block cooldowns.
    pub blocking: BlockingConfig,

    /// Security event ring buffer.
    pub event_log: EventLogConfig,

    /// Stats aggregation defaults and status thresholds.
    pub stats: StatsConfig,

    /// Stale state sweeping.
    pub sweep: SweepConfig,

    /// Source identity derivation.
    pub source: SourceConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Admin API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream (protected service) configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000"). When unset, admitted
    /// requests are answered by the shield itself.
    pub address: Option<String>,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: None,
            request_timeout_secs: 30,
        }
    }
}

/// Fixed-window rate limiting.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Counter window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per window.
    pub sustained_limit: u32,

    /// Length of the burst sub-window at the start of each window.
    pub burst_window_ms: u64,

    /// Maximum requests inside the burst sub-window.
    pub burst_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            sustained_limit: 60,
            burst_window_ms: 1_000,
            burst_limit: 10,
        }
    }
}

/// Block durations.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockingConfig {
    /// Cooldown after a rate-limit violation.
    pub rate_limit_cooldown_ms: u64,

    /// Cooldown after a pattern match. Longer: a match signals intent.
    pub threat_cooldown_ms: u64,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            rate_limit_cooldown_ms: 10 * 60 * 1000,
            threat_cooldown_ms: 2 * 60 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Maximum retained events; the oldest is evicted first.
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Default summary window in milliseconds.
    pub window_ms: u64,

    /// Events in window at which status becomes `alert`.
    pub alert_threshold: usize,

    /// Events in window above which status becomes `under_attack`.
    pub under_attack_threshold: usize,

    /// Number of offenders reported.
    pub top_offenders: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_ms: 24 * 60 * 60 * 1000,
            alert_threshold: 10,
            under_attack_threshold: 100,
            top_offenders: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,

    /// How long a block must have been expired before it can be dropped.
    pub grace_ms: u64,

    /// Records with more offenses than this are kept.
    pub max_offense_count: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            grace_ms: 60 * 60 * 1000,
            max_offense_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Use the first X-Forwarded-For entry as the source when present.
    /// Disable when the shield is not behind a trusted proxy.
    pub trust_forwarded_for: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            trust_forwarded_for: true,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ShieldConfig = toml::from_str("").unwrap();
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.event_log.capacity, 1000);
        assert_eq!(config.blocking.rate_limit_cooldown_ms, 600_000);
        assert_eq!(config.blocking.threat_cooldown_ms, 7_200_000);
        assert!(config.upstream.address.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config: ShieldConfig = toml::from_str(
            r#"
            [rate_limit]
            sustained_limit = 120

            [upstream]
            address = "127.0.0.1:3000"

            [stats]
            alert_threshold = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.rate_limit.sustained_limit, 120);
        assert_eq!(config.rate_limit.burst_limit, 10);
        assert_eq!(config.upstream.address.as_deref(), Some("127.0.0.1:3000"));
        assert_eq!(config.stats.alert_threshold, 5);
        assert_eq!(config.stats.under_attack_threshold, 100);
    }
}
