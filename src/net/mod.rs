//! Networking collaborators.
//!
//! - [`connection`] - Connection liveness contract used by requests

pub mod connection;
