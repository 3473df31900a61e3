//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ShieldConfig (validated, immutable)
//!     → handed to SecurityMiddleware and the HTTP edge
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server applies it (rate limits, cooldowns, thresholds swap atomically)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An invalid config at startup is fatal; an invalid reload is ignored

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BlockingConfig, EventLogConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, ShieldConfig, SourceConfig, StatsConfig, SweepConfig,
    UpstreamConfig,
};
