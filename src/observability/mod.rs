//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate, sweeper, HTTP edge produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (verdict counters, block counters, store gauges)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - Metric recording is always safe to call; without an installed
//!   recorder the calls are no-ops
//! - `RUST_LOG` overrides the configured log level

pub mod logging;
pub mod metrics;
