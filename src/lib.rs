//! Quorum Request - request envelope for a replicated coordination service.
//!
//! Every client or replicated operation travels through the server's request
//! pipeline inside a [`Request`]. The envelope carries the client identity, the
//! encoded payload, the transaction assigned once an operation is accepted for
//! replication and the bookkeeping each stage adds on the way through.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Ingress (client connections, learners)          │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │  admission (large, throttled)
//! ┌─────────────────────────────────────────────────────────────────┐
//! │           Pipeline stages (prep → commit → sync → final)        │
//! │     stale / must-drop filtering │ stage timestamps │ latency    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Transaction log (framed, checksummed)           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing, validation and stale-check switches
//! - [`core::time`] - Clock helpers
//! - [`core::error`] - Error types and operation result codes
//!
//! ## Request
//! - [`request::envelope`] - The request envelope
//! - [`request::opcode`] - Operation codes and classification
//! - [`request::payload`] - Payload bytes and record decoding
//! - [`request::auth`] - Authenticated identities
//! - [`request::peer`] - Request owners and quorum configuration
//!
//! ## Storage
//! - [`storage::records`] - Transaction header, body and digest records
//! - [`storage::txnlog`] - Transaction log framing, writer and reader
//!
//! ## Networking
//! - [`net::connection`] - Client connection contract
//!
//! ## Pipeline
//! - [`pipeline::stage`] - Stage hand-off and drop filtering
//! - [`pipeline::admission`] - Large-request and outstanding-request admission
//!
//! ## Operations
//! - [`ops::observability`] - Latency recorders and request metrics
//! - [`ops::telemetry`] - Structured logging setup
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - A transaction is attached at most once; a zxid implies a header.
//! - The first recorded error and the first owner win.
//! - Session create/close are never dropped as stale and never throttled.
//! - Negative wall-clock latencies are never reported.

// Core infrastructure
pub mod core;

// Request envelope
pub mod request;

// Storage layer
pub mod storage;

// Networking
pub mod net;

// Stage hand-off and admission
pub mod pipeline;

// Operations and observability
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, time};
pub use net::connection;
pub use ops::{observability, telemetry};
pub use request::{auth, envelope, opcode, payload, peer, OpCode, Request, Stage};
pub use storage::{records, txnlog};
