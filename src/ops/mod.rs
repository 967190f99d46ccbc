//! Operations and observability.
//!
//! - [`observability`] - Latency recorder contract and request metrics
//! - [`telemetry`] - Structured logging setup

pub mod observability;
pub mod telemetry;
