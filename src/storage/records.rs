//! Transaction records.
//!
//! Once the leader assigns a zxid, a request is described by a header, a body
//! with the agreed state change, and optionally a digest of the data tree after
//! applying it. These three are what gets persisted and replayed.

use crate::request::auth::Id;
use crate::request::opcode::OpCode;
use serde::{Deserialize, Serialize};

/// Header assigned to a transaction when it is proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnHeader {
    /// Session that issued the request.
    pub client_id: i64,
    /// Client exchange id of the request.
    pub cxid: i32,
    /// Sequence number assigned by agreement.
    pub zxid: i64,
    /// Leader wall-clock time in milliseconds when the proposal was made.
    pub time: i64,
    /// Transaction type (an [`OpCode`] value).
    pub op_type: i32,
}

impl TxnHeader {
    pub fn new(client_id: i64, cxid: i32, zxid: i64, time: i64, op_type: i32) -> Self {
        Self {
            client_id,
            cxid,
            zxid,
            time,
            op_type,
        }
    }

    /// Epoch half of the zxid.
    pub fn epoch(&self) -> u32 {
        (self.zxid >> 32) as u32
    }

    /// Counter half of the zxid.
    pub fn counter(&self) -> u32 {
        (self.zxid & 0xffff_ffff) as u32
    }
}

/// Digest of the data tree after a transaction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnDigest {
    /// Digest algorithm version.
    pub version: i32,
    /// Digest value.
    pub tree_digest: i64,
}

impl TxnDigest {
    pub fn new(version: i32, tree_digest: i64) -> Self {
        Self {
            version,
            tree_digest,
        }
    }
}

/// Access control entry attached to created nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub perms: i32,
    pub id: Id,
}

/// The agreed state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnBody {
    Create {
        path: String,
        data: Vec<u8>,
        acl: Vec<Acl>,
        ephemeral: bool,
        parent_cversion: i32,
    },
    CreateContainer {
        path: String,
        data: Vec<u8>,
        acl: Vec<Acl>,
        parent_cversion: i32,
    },
    CreateTtl {
        path: String,
        data: Vec<u8>,
        acl: Vec<Acl>,
        parent_cversion: i32,
        ttl: i64,
    },
    Delete {
        path: String,
    },
    SetData {
        path: String,
        data: Vec<u8>,
        version: i32,
    },
    SetAcl {
        path: String,
        acl: Vec<Acl>,
        version: i32,
    },
    CheckVersion {
        path: String,
        version: i32,
    },
    CreateSession {
        timeout_ms: i32,
    },
    CloseSession {
        paths_to_delete: Vec<String>,
    },
    Error {
        err: i32,
    },
    Reconfig {
        config: Vec<u8>,
    },
    Multi {
        txns: Vec<TxnBody>,
    },
}

impl TxnBody {
    /// The transaction type this body is persisted under.
    pub fn op_code(&self) -> OpCode {
        match self {
            Self::Create { .. } => OpCode::Create,
            Self::CreateContainer { .. } => OpCode::CreateContainer,
            Self::CreateTtl { .. } => OpCode::CreateTtl,
            Self::Delete { .. } => OpCode::Delete,
            Self::SetData { .. } => OpCode::SetData,
            Self::SetAcl { .. } => OpCode::SetAcl,
            Self::CheckVersion { .. } => OpCode::Check,
            Self::CreateSession { .. } => OpCode::CreateSession,
            Self::CloseSession { .. } => OpCode::CloseSession,
            Self::Error { .. } => OpCode::Error,
            Self::Reconfig { .. } => OpCode::Reconfig,
            Self::Multi { .. } => OpCode::Multi,
        }
    }

    /// Path the mutation targets, for single-path bodies.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Create { path, .. }
            | Self::CreateContainer { path, .. }
            | Self::CreateTtl { path, .. }
            | Self::Delete { path }
            | Self::SetData { path, .. }
            | Self::SetAcl { path, .. }
            | Self::CheckVersion { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zxid_halves() {
        let header = TxnHeader::new(1, 2, 0x0000_0005_0000_0010, 0, OpCode::Create.code());
        assert_eq!(header.epoch(), 5);
        assert_eq!(header.counter(), 0x10);
    }

    #[test]
    fn body_types_and_paths() {
        let body = TxnBody::SetData {
            path: "/a".to_string(),
            data: vec![],
            version: 1,
        };
        assert_eq!(body.op_code(), OpCode::SetData);
        assert_eq!(body.path(), Some("/a"));

        let multi = TxnBody::Multi { txns: vec![body] };
        assert_eq!(multi.op_code(), OpCode::Multi);
        assert_eq!(multi.path(), None);
    }
}
