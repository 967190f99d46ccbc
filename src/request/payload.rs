//! Client payload handling.
//!
//! The envelope keeps the client's bytes undecoded. Stages that need the
//! structured record supply a [`RecordDecoder`] for the schema they expect.

use crate::core::error::{RequestError, RequestResult};
use bytes::{Buf, Bytes};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Upper bound on a path length accepted by best-effort extraction.
pub const MAX_DIAGNOSTIC_PATH_LEN: usize = 4096;

/// Undecoded request bytes as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPayload {
    bytes: Bytes,
}

impl RequestPayload {
    /// Wrap received bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Raw bytes. Cloning is a reference-count bump.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Borrow the raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode into a structured record.
    pub fn decode<D: RecordDecoder>(&self, decoder: &D) -> RequestResult<D::Record> {
        decoder.decode(&self.bytes)
    }

    /// Lowercase hex dump of the payload.
    pub fn digest_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl From<Vec<u8>> for RequestPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<Bytes> for RequestPayload {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

/// Decodes payload bytes into a record of a concrete schema.
pub trait RecordDecoder {
    /// The decoded record type.
    type Record;

    /// Decode a record from the full payload.
    fn decode(&self, bytes: &[u8]) -> RequestResult<Self::Record>;
}

/// Adapts a decoding function into a [`RecordDecoder`].
pub struct FnDecoder<F>(pub F);

impl<F, T> RecordDecoder for FnDecoder<F>
where
    F: Fn(&[u8]) -> RequestResult<T>,
{
    type Record = T;

    fn decode(&self, bytes: &[u8]) -> RequestResult<T> {
        (self.0)(bytes)
    }
}

/// Decoder for serde records encoded with bincode.
pub struct BincodeDecoder<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T> BincodeDecoder<T> {
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<T> Default for BincodeDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> RecordDecoder for BincodeDecoder<T> {
    type Record = T;

    fn decode(&self, bytes: &[u8]) -> RequestResult<T> {
        bincode::deserialize(bytes).map_err(|e| RequestError::decode(e.to_string()))
    }
}

/// Decoder that reads only the leading path of a path-first payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathDecoder;

impl RecordDecoder for PathDecoder {
    type Record = String;

    fn decode(&self, bytes: &[u8]) -> RequestResult<String> {
        extract_path(bytes)
    }
}

/// Read a big-endian length-prefixed UTF-8 path from the front of `bytes`.
///
/// The declared length must be non-negative, below
/// [`MAX_DIAGNOSTIC_PATH_LEN`], and fit in the remaining buffer.
pub fn extract_path(bytes: &[u8]) -> RequestResult<String> {
    let mut buf = bytes;
    if buf.remaining() < 4 {
        return Err(RequestError::decode("payload shorter than path length prefix"));
    }
    let declared = buf.get_i32();
    let len = usize::try_from(declared)
        .map_err(|_| RequestError::decode(format!("negative path length {}", declared)))?;
    if len >= MAX_DIAGNOSTIC_PATH_LEN {
        return Err(RequestError::decode(format!(
            "path length {} exceeds {}",
            len, MAX_DIAGNOSTIC_PATH_LEN
        )));
    }
    if buf.remaining() < len {
        return Err(RequestError::decode(format!(
            "path length {} exceeds remaining {} bytes",
            len,
            buf.remaining()
        )));
    }
    String::from_utf8(buf[..len].to_vec()).map_err(|e| RequestError::decode(e.to_string()))
}

/// Encode a path the way [`extract_path`] reads it. Used by ingress tooling
/// and tests to build path-first payloads.
pub fn encode_path(path: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + path.len());
    out.extend_from_slice(&(path.len() as i32).to_be_bytes());
    out.extend_from_slice(path.as_bytes());
    out
}
