//! Operation codes and their classification.
//!
//! The table here decides three things for every code: whether clients may
//! submit it, whether it must go through quorum agreement, and what to call
//! it in logs. Names are for diagnostics only and never drive routing.

use std::borrow::Cow;

/// Operation codes understood by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    Notification = 0,
    Create = 1,
    Delete = 2,
    Exists = 3,
    GetData = 4,
    SetData = 5,
    GetAcl = 6,
    SetAcl = 7,
    GetChildren = 8,
    Sync = 9,
    Ping = 11,
    GetChildren2 = 12,
    Check = 13,
    Multi = 14,
    Create2 = 15,
    Reconfig = 16,
    CheckWatches = 17,
    RemoveWatches = 18,
    CreateContainer = 19,
    DeleteContainer = 20,
    CreateTtl = 21,
    MultiRead = 22,
    Auth = 100,
    SetWatches = 101,
    Sasl = 102,
    GetEphemerals = 103,
    GetAllChildrenNumber = 104,
    SetWatches2 = 105,
    AddWatch = 106,
    WhoAmI = 107,
    CreateSession = -10,
    CloseSession = -11,
    Error = -1,
}

const ALL: [OpCode; 33] = [
    OpCode::Notification,
    OpCode::Create,
    OpCode::Delete,
    OpCode::Exists,
    OpCode::GetData,
    OpCode::SetData,
    OpCode::GetAcl,
    OpCode::SetAcl,
    OpCode::GetChildren,
    OpCode::Sync,
    OpCode::Ping,
    OpCode::GetChildren2,
    OpCode::Check,
    OpCode::Multi,
    OpCode::Create2,
    OpCode::Reconfig,
    OpCode::CheckWatches,
    OpCode::RemoveWatches,
    OpCode::CreateContainer,
    OpCode::DeleteContainer,
    OpCode::CreateTtl,
    OpCode::MultiRead,
    OpCode::Auth,
    OpCode::SetWatches,
    OpCode::Sasl,
    OpCode::GetEphemerals,
    OpCode::GetAllChildrenNumber,
    OpCode::SetWatches2,
    OpCode::AddWatch,
    OpCode::WhoAmI,
    OpCode::CreateSession,
    OpCode::CloseSession,
    OpCode::Error,
];

impl OpCode {
    /// Every known code, valid or not.
    pub const fn all() -> &'static [OpCode] {
        &ALL
    }

    /// Integer value on the wire.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Look up a known code.
    pub fn from_code(code: i32) -> Option<Self> {
        ALL.iter().copied().find(|op| op.code() == code)
    }

    /// Look up a code by its diagnostic name (case-sensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Stable diagnostic name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Exists => "exists",
            Self::GetData => "getData",
            Self::SetData => "setData",
            Self::GetAcl => "getACL",
            Self::SetAcl => "setACL",
            Self::GetChildren => "getChildren",
            Self::Sync => "sync",
            Self::Ping => "ping",
            Self::GetChildren2 => "getChildren2",
            Self::Check => "check",
            Self::Multi => "multi",
            Self::Create2 => "create2",
            Self::Reconfig => "reconfig",
            Self::CheckWatches => "checkWatches",
            Self::RemoveWatches => "removeWatches",
            Self::CreateContainer => "createContainer",
            Self::DeleteContainer => "deleteContainer",
            Self::CreateTtl => "createTTL",
            Self::MultiRead => "multiRead",
            Self::Auth => "auth",
            Self::SetWatches => "setWatches",
            Self::Sasl => "sasl",
            Self::GetEphemerals => "getEphemerals",
            Self::GetAllChildrenNumber => "getAllChildrenNumber",
            Self::SetWatches2 => "setWatches2",
            Self::AddWatch => "addWatch",
            Self::WhoAmI => "whoAmI",
            Self::CreateSession => "createSession",
            Self::CloseSession => "closeSession",
            Self::Error => "error",
        }
    }

    /// Whether clients may submit this operation.
    ///
    /// `notification` and `check` exist only as internal primitives; `auth`,
    /// `sasl` and `error` never enter the request pipeline as operations.
    pub const fn is_valid(self) -> bool {
        match self {
            Self::Notification | Self::Check | Self::Auth | Self::Sasl | Self::Error => false,
            Self::CloseSession
            | Self::Create
            | Self::Create2
            | Self::CreateTtl
            | Self::CreateContainer
            | Self::CreateSession
            | Self::Delete
            | Self::DeleteContainer
            | Self::Exists
            | Self::GetAcl
            | Self::GetChildren
            | Self::GetAllChildrenNumber
            | Self::GetChildren2
            | Self::GetData
            | Self::GetEphemerals
            | Self::Multi
            | Self::MultiRead
            | Self::Ping
            | Self::Reconfig
            | Self::SetAcl
            | Self::SetData
            | Self::SetWatches
            | Self::SetWatches2
            | Self::Sync
            | Self::CheckWatches
            | Self::RemoveWatches
            | Self::AddWatch
            | Self::WhoAmI => true,
        }
    }

    /// Whether this operation must be agreed by a quorum.
    ///
    /// Session create and close only need agreement for global sessions.
    pub const fn requires_quorum(self, is_local_session: bool) -> bool {
        match self {
            Self::Exists
            | Self::GetAcl
            | Self::GetChildren
            | Self::GetAllChildrenNumber
            | Self::GetChildren2
            | Self::GetData
            | Self::GetEphemerals
            | Self::MultiRead
            | Self::WhoAmI => false,
            Self::Create
            | Self::Create2
            | Self::CreateTtl
            | Self::CreateContainer
            | Self::Error
            | Self::Delete
            | Self::DeleteContainer
            | Self::SetAcl
            | Self::SetData
            | Self::Check
            | Self::Multi
            | Self::Reconfig => true,
            Self::CloseSession | Self::CreateSession => !is_local_session,
            _ => false,
        }
    }

    /// Whether admission control may delay this operation.
    ///
    /// Pings and session lifecycle keep sessions alive and are never held
    /// back.
    pub const fn is_throttlable(self) -> bool {
        !matches!(self, Self::Ping | Self::CreateSession | Self::CloseSession)
    }

    /// Whether the payload of this operation begins with a path string.
    pub const fn carries_leading_path(self) -> bool {
        !matches!(
            self,
            Self::CreateSession | Self::SetWatches | Self::SetWatches2 | Self::CloseSession
        )
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for OpCode {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, i32> {
        Self::from_code(code).ok_or(code)
    }
}

/// Whether a raw code is a client-submittable operation.
pub fn is_valid(code: i32) -> bool {
    OpCode::from_code(code).is_some_and(OpCode::is_valid)
}

/// Whether a raw code requires quorum agreement. Unknown codes never do.
pub fn requires_quorum(code: i32, is_local_session: bool) -> bool {
    OpCode::from_code(code).is_some_and(|op| op.requires_quorum(is_local_session))
}

/// Whether a raw code may be throttled. Unknown codes may.
pub fn is_throttlable(code: i32) -> bool {
    OpCode::from_code(code).map_or(true, OpCode::is_throttlable)
}

/// Diagnostic name for a raw code.
pub fn op_name(code: i32) -> Cow<'static, str> {
    match OpCode::from_code(code) {
        Some(op) => Cow::Borrowed(op.name()),
        None => Cow::Owned(format!("unknown {}", code)),
    }
}
