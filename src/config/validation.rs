//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits, windows and cooldowns > 0)
//! - Check threshold ordering (burst inside sustained, alert below under-attack)
//! - Check addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ShieldConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ShieldConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be less than {other}")]
    NotLess { field: &'static str, other: &'static str },

    #[error("{field} must not exceed {other}")]
    Exceeds { field: &'static str, other: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    Address { field: &'static str, value: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &ShieldConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut non_zero = |field: &'static str, value: u64| {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    };
    non_zero("rate_limit.window_ms", config.rate_limit.window_ms);
    non_zero("rate_limit.sustained_limit", config.rate_limit.sustained_limit as u64);
    non_zero("rate_limit.burst_window_ms", config.rate_limit.burst_window_ms);
    non_zero("rate_limit.burst_limit", config.rate_limit.burst_limit as u64);
    non_zero("blocking.rate_limit_cooldown_ms", config.blocking.rate_limit_cooldown_ms);
    non_zero("blocking.threat_cooldown_ms", config.blocking.threat_cooldown_ms);
    non_zero("event_log.capacity", config.event_log.capacity as u64);
    non_zero("stats.window_ms", config.stats.window_ms);
    non_zero("stats.top_offenders", config.stats.top_offenders as u64);
    non_zero("sweep.interval_secs", config.sweep.interval_secs);
    non_zero("upstream.request_timeout_secs", config.upstream.request_timeout_secs);
    non_zero("security.max_body_size", config.security.max_body_size as u64);

    if config.rate_limit.burst_window_ms >= config.rate_limit.window_ms {
        errors.push(ValidationError::NotLess {
            field: "rate_limit.burst_window_ms",
            other: "rate_limit.window_ms",
        });
    }
    if config.rate_limit.burst_limit > config.rate_limit.sustained_limit {
        errors.push(ValidationError::Exceeds {
            field: "rate_limit.burst_limit",
            other: "rate_limit.sustained_limit",
        });
    }
    if config.stats.alert_threshold >= config.stats.under_attack_threshold {
        errors.push(ValidationError::NotLess {
            field: "stats.alert_threshold",
            other: "stats.under_attack_threshold",
        });
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if let Some(address) = &config.upstream.address {
        check_address(&mut errors, "upstream.address", address);
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::Empty { field: "admin.api_key" });
        }
    }
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field,
            value: value.to_string(),
        });
    }
}
