//! Request middleware.

pub mod shield;

pub use shield::shield_middleware;
