//! Core infrastructure.
//!
//! - [`config`] - Configuration parsing, validation and stale-check switches
//! - [`time`] - Monotonic and wall-clock helpers
//! - [`error`] - Error types and client result codes

pub mod config;
pub mod error;
pub mod time;
