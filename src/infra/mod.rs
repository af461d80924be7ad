//! Infrastructure adapters and runtime bootstrap.

pub mod backends;
pub mod error;
pub mod http;
pub mod telemetry;
