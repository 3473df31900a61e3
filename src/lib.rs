//! Adaptive request defense for HTTP services.
//!
//! Sits in front of a protected service and decides, per request, whether
//! to admit or deny it: sources that are already blocked are turned away,
//! sources exceeding sustained or burst rates are blocked briefly, and
//! requests matching attack signatures get their source blocked for longer.
//! Every denial is recorded in a bounded event log that backs the admin API.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ShieldConfig;
pub use http::ShieldServer;
pub use lifecycle::Shutdown;
pub use security::SecurityMiddleware;
