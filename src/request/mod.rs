//! Request envelope and operation classification.
//!
//! - [`envelope`] - The per-operation request envelope
//! - [`opcode`] - Operation codes and quorum/validity classification
//! - [`payload`] - Undecoded client payloads and record decoders
//! - [`auth`] - Client identities and audit formatting
//! - [`peer`] - Request ownership and reconfig membership

pub mod auth;
pub mod envelope;
pub mod opcode;
pub mod payload;
pub mod peer;

pub use envelope::{Request, Stage, StageTimes};
pub use opcode::OpCode;
