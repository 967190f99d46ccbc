//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use parking_lot::Mutex;
use quorum_request::net::connection::{ConnectionRef, TrackedConnection};
use quorum_request::observability::{KeyedLatencyRecorder, LatencyRecorder};
use quorum_request::payload::{self, RequestPayload};
use quorum_request::records::{TxnBody, TxnDigest, TxnHeader};
use quorum_request::{OpCode, Request};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Session timeout used by test connections.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a live tracked connection.
pub fn connection(id: u64) -> Arc<TrackedConnection> {
    Arc::new(TrackedConnection::new(id, SESSION_TIMEOUT))
}

/// Build a client request bound to `conn` with no payload.
pub fn client_request(conn: &Arc<TrackedConnection>, op: OpCode) -> Request {
    Request::from_client(
        Some(ConnectionRef::new(conn)),
        0x1000 + conn.id() as i64,
        1,
        op.code(),
        None,
        Vec::new(),
    )
}

/// Build a connectionless client request carrying a path-first payload.
pub fn path_request(op: OpCode, path: &str) -> Request {
    Request::from_client(
        None,
        0x42,
        7,
        op.code(),
        Some(RequestPayload::new(payload::encode_path(path))),
        Vec::new(),
    )
}

/// Header, body and digest of an agreed `create`.
pub fn agreed_create(zxid: i64, time: i64) -> (TxnHeader, TxnBody, TxnDigest) {
    let header = TxnHeader::new(0x42, 7, zxid, time, OpCode::Create.code());
    let body = TxnBody::Create {
        path: "/app/node".to_string(),
        data: b"payload".to_vec(),
        acl: Vec::new(),
        ephemeral: false,
        parent_cversion: 3,
    };
    let digest = TxnDigest::new(2, 0x5eed_cafe);
    (header, body, digest)
}

/// Create a configuration file from TOML text.
pub fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Recorder that keeps every sample it receives.
#[derive(Default)]
pub struct CapturingRecorder {
    pub samples: Mutex<Vec<Duration>>,
    pub keyed: Mutex<Vec<(String, Duration)>>,
}

impl CapturingRecorder {
    pub fn samples(&self) -> Vec<Duration> {
        self.samples.lock().clone()
    }
}

impl LatencyRecorder for CapturingRecorder {
    fn add(&self, latency: Duration) {
        self.samples.lock().push(latency);
    }
}

impl KeyedLatencyRecorder for CapturingRecorder {
    fn add(&self, key: &str, latency: Duration) {
        self.keyed.lock().push((key.to_string(), latency));
    }
}
