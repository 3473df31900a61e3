//! Adaptive request defense.
//!
//! # Data Flow
//! ```text
//! Incoming request (RequestView)
//!     → gate.rs (orchestrates, only component with side effects)
//!         → blocklist.rs   (is the source blocked?)
//!         → rate_limit.rs  (sustained / burst counters)
//!         → classifier.rs  (patterns.rs catalog → threat matches)
//!         → events.rs      (bounded event log)
//!     → Verdict (admit / deny) back to the HTTP layer
//!
//! Admin queries:
//!     events.rs snapshot → stats.rs (rolling-window summary)
//!
//! Background:
//!     sweep.rs → drops stale block records and rate counters
//! ```
//!
//! # Design Decisions
//! - Fail closed: an internal error denies the request
//! - All state lives in one `SecurityMiddleware`, constructed at startup
//!   and shared by `Arc`; there are no module-level singletons
//! - State is per process; several independent instances do not share it

pub mod blocklist;
pub mod classifier;
pub mod events;
pub mod gate;
pub mod patterns;
pub mod rate_limit;
pub mod stats;
pub mod sweep;
pub mod types;

pub use blocklist::{BlockRecord, BlockRegistry, BlockedSource};
pub use classifier::{PatternClassifier, RequestView, ThreatClassifier, ThreatMatch};
pub use events::{EventLog, SecurityEvent};
pub use gate::{Outcome, SecurityMiddleware, SweepReport, Verdict};
pub use patterns::PatternCatalog;
pub use rate_limit::{RateDecision, RateLimiter, RateRecord};
pub use stats::{SecurityStats, ShieldStatus};
pub use sweep::Sweeper;
pub use types::{Clock, EventKind, ManualClock, Severity, ShieldError, SystemClock, ThreatCategory};
