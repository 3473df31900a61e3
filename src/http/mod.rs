//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace / timeout / request-id layers)
//!     → middleware/shield.rs (source, body limit, gate verdict)
//!         denied   → response.rs (403 / 429 JSON, never forwarded)
//!         admitted → server.rs (forward to upstream, or built-in responder)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{client_source, request_view, X_FORWARDED_FOR, X_REQUEST_ID};
pub use server::{AppState, ShieldServer};
