//! Error types and client-visible result codes.
//!
//! Two families live here. [`RequestError`] is returned by envelope and
//! persistence operations to the calling stage. [`OperationError`] is the
//! structured failure a stage stores on an envelope so the terminal stage can
//! turn it into a client response; it never crosses stage boundaries as an
//! `Err`.

use thiserror::Error;

/// Errors surfaced by envelope, payload and transaction-log operations.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The envelope carries no client payload (transaction or replay path).
    #[error("request payload unavailable")]
    PayloadUnavailable,

    /// The payload bytes could not be decoded into the requested record.
    #[error("failed to decode request payload: {message}")]
    Decode { message: String },

    /// A transaction header was already assigned to this envelope.
    #[error("transaction already assigned at zxid 0x{zxid:x}")]
    TxnAlreadyAssigned { zxid: i64 },

    /// Session locality may only be decided once.
    #[error("local session flag already set")]
    LocalSessionAlreadySet,

    /// An agreed transaction could not be encoded.
    #[error("failed to encode transaction entry: {message}")]
    Encode { message: String },

    /// A persisted log frame failed validation.
    #[error("corrupt transaction log entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    /// A pipeline stage is no longer accepting requests.
    #[error("pipeline stage {stage} is closed")]
    StageClosed { stage: String },

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    /// Create a Decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an Encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Create a CorruptEntry error.
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptEntry {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether a caller can reasonably continue after this error.
    ///
    /// Missing or undecodable payloads are per-request conditions. Encoding
    /// and log corruption indicate a defect or damaged storage.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PayloadUnavailable | Self::Decode { .. })
    }
}

/// Result type using RequestError.
pub type RequestResult<T> = Result<T, RequestError>;

// ============================================================================
// Client-visible result codes
// ============================================================================

/// Result codes reported back to clients.
///
/// The integer values are part of the wire protocol and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    SystemError,
    RuntimeInconsistency,
    DataInconsistency,
    ConnectionLoss,
    MarshallingError,
    Unimplemented,
    OperationTimeout,
    BadArguments,
    UnknownSession,
    NewConfigNoQuorum,
    ReconfigInProgress,
    ApiError,
    NoNode,
    NoAuth,
    BadVersion,
    NoChildrenForEphemerals,
    NodeExists,
    NotEmpty,
    SessionExpired,
    InvalidCallback,
    InvalidAcl,
    AuthFailed,
    SessionMoved,
    NotReadOnly,
    EphemeralOnLocalSession,
    NoWatcher,
    ReconfigDisabled,
    SessionClosedRequireSaslAuth,
    QuotaExceeded,
    Throttled,
}

impl ErrorCode {
    /// Integer value carried on the wire and in error transactions.
    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::SystemError => -1,
            Self::RuntimeInconsistency => -2,
            Self::DataInconsistency => -3,
            Self::ConnectionLoss => -4,
            Self::MarshallingError => -5,
            Self::Unimplemented => -6,
            Self::OperationTimeout => -7,
            Self::BadArguments => -8,
            Self::UnknownSession => -12,
            Self::NewConfigNoQuorum => -13,
            Self::ReconfigInProgress => -14,
            Self::ApiError => -100,
            Self::NoNode => -101,
            Self::NoAuth => -102,
            Self::BadVersion => -103,
            Self::NoChildrenForEphemerals => -108,
            Self::NodeExists => -110,
            Self::NotEmpty => -111,
            Self::SessionExpired => -112,
            Self::InvalidCallback => -113,
            Self::InvalidAcl => -114,
            Self::AuthFailed => -115,
            Self::SessionMoved => -118,
            Self::NotReadOnly => -119,
            Self::EphemeralOnLocalSession => -120,
            Self::NoWatcher => -121,
            Self::ReconfigDisabled => -123,
            Self::SessionClosedRequireSaslAuth => -124,
            Self::QuotaExceeded => -125,
            Self::Throttled => -127,
        }
    }

    /// Look up a code by its integer value.
    pub fn from_code(code: i32) -> Option<Self> {
        let found = match code {
            0 => Self::Ok,
            -1 => Self::SystemError,
            -2 => Self::RuntimeInconsistency,
            -3 => Self::DataInconsistency,
            -4 => Self::ConnectionLoss,
            -5 => Self::MarshallingError,
            -6 => Self::Unimplemented,
            -7 => Self::OperationTimeout,
            -8 => Self::BadArguments,
            -12 => Self::UnknownSession,
            -13 => Self::NewConfigNoQuorum,
            -14 => Self::ReconfigInProgress,
            -100 => Self::ApiError,
            -101 => Self::NoNode,
            -102 => Self::NoAuth,
            -103 => Self::BadVersion,
            -108 => Self::NoChildrenForEphemerals,
            -110 => Self::NodeExists,
            -111 => Self::NotEmpty,
            -112 => Self::SessionExpired,
            -113 => Self::InvalidCallback,
            -114 => Self::InvalidAcl,
            -115 => Self::AuthFailed,
            -118 => Self::SessionMoved,
            -119 => Self::NotReadOnly,
            -120 => Self::EphemeralOnLocalSession,
            -121 => Self::NoWatcher,
            -123 => Self::ReconfigDisabled,
            -124 => Self::SessionClosedRequireSaslAuth,
            -125 => Self::QuotaExceeded,
            -127 => Self::Throttled,
            _ => return None,
        };
        Some(found)
    }

    /// Human-readable description used in logs and client messages.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::SystemError => "SystemError",
            Self::RuntimeInconsistency => "RuntimeInconsistency",
            Self::DataInconsistency => "DataInconsistency",
            Self::ConnectionLoss => "ConnectionLoss",
            Self::MarshallingError => "MarshallingError",
            Self::Unimplemented => "Unimplemented",
            Self::OperationTimeout => "OperationTimeout",
            Self::BadArguments => "BadArguments",
            Self::UnknownSession => "UnknownSession",
            Self::NewConfigNoQuorum => "NewConfigNoQuorum",
            Self::ReconfigInProgress => "ReconfigInProgress",
            Self::ApiError => "APIError",
            Self::NoNode => "NoNode",
            Self::NoAuth => "NoAuth",
            Self::BadVersion => "BadVersion",
            Self::NoChildrenForEphemerals => "NoChildrenForEphemerals",
            Self::NodeExists => "NodeExists",
            Self::NotEmpty => "Directory not empty",
            Self::SessionExpired => "Session expired",
            Self::InvalidCallback => "Invalid callback",
            Self::InvalidAcl => "InvalidACL",
            Self::AuthFailed => "AuthFailed",
            Self::SessionMoved => "Session moved",
            Self::NotReadOnly => "Not a read-only call",
            Self::EphemeralOnLocalSession => "Ephemeral node on local session",
            Self::NoWatcher => "No such watcher",
            Self::ReconfigDisabled => "Reconfig is disabled",
            Self::SessionClosedRequireSaslAuth => "Session closed because client failed to authenticate",
            Self::QuotaExceeded => "Quota has exceeded",
            Self::Throttled => "Op throttled due to high load",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Failure recorded on an envelope for the terminal stage to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    /// Result code returned to the client.
    pub code: ErrorCode,
    /// Path the failure relates to, when known.
    pub path: Option<String>,
}

impl OperationError {
    /// Create an error without a path.
    pub fn new(code: ErrorCode) -> Self {
        Self { code, path: None }
    }

    /// Create an error for a specific path.
    pub fn with_path(code: ErrorCode, path: impl Into<String>) -> Self {
        Self {
            code,
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "KeeperErrorCode = {} for {}", self.code, path),
            None => write!(f, "KeeperErrorCode = {}", self.code),
        }
    }
}

impl std::error::Error for OperationError {}
