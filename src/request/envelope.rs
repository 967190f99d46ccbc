//! The request envelope.
//!
//! A [`Request`] wraps one client operation or one replicated transaction as
//! it moves through the processing pipeline. Identity fields are fixed at
//! construction. Stages annotate the rest in place: ownership, throttling,
//! stage timestamps, the agreed transaction, and a terminal error.
//!
//! Requests are handed from stage to stage by value, so a request is never
//! mutated by two stages at once and needs no internal locking.

use crate::core::config::StaleChecks;
use crate::core::error::{OperationError, RequestError, RequestResult};
use crate::core::time;
use crate::net::connection::{ConnectionRef, ServerConnection};
use crate::ops::observability::{KeyedLatencyRecorder, LatencyRecorder};
use crate::request::auth::{self, Id};
use crate::request::opcode::{self, OpCode};
use crate::request::payload::{self, RecordDecoder, RequestPayload};
use crate::request::peer::{QuorumVerifier, RequestOwner};
use crate::storage::records::{TxnBody, TxnDigest, TxnHeader};
use crate::storage::txnlog::{self, TxnEntry};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Digest rendering used when a request carries no payload.
pub const NO_PAYLOAD_DIGEST: &str = "request buffer is null";

/// Rendering of a zxid that has not been agreed yet.
pub const UNASSIGNED_ZXID: &str = "unassigned";

/// Rendering of a path that could not be extracted.
pub const UNKNOWN_PATH: &str = "n/a";

/// Size of the zero-filled entry substituted when an agreed transaction
/// fails to encode.
pub const ENCODE_FAILURE_PLACEHOLDER_LEN: usize = 32;

// ============================================================================
// Stage timestamps
// ============================================================================

/// Pipeline points whose timing a request records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Entered the prep stage queue.
    PrepQueue,
    /// Prep stage started processing.
    Prep,
    /// Entered the commit processor queue.
    CommitQueue,
    /// Commit for this request received.
    CommitReceived,
    /// Entered the sync queue.
    SyncQueue,
    /// Entered the admission throttle queue.
    ThrottleQueue,
}

impl Stage {
    const COUNT: usize = 6;

    const fn index(self) -> usize {
        match self {
            Self::PrepQueue => 0,
            Self::Prep => 1,
            Self::CommitQueue => 2,
            Self::CommitReceived => 3,
            Self::SyncQueue => 4,
            Self::ThrottleQueue => 5,
        }
    }
}

/// Write-once monotonic timestamps, one per [`Stage`].
///
/// These only feed latency reporting. No routing decision reads them.
#[derive(Debug, Clone, Default)]
pub struct StageTimes {
    stamps: [Option<Instant>; Stage::COUNT],
}

impl StageTimes {
    /// Stamp a stage. Returns `false` if it was already stamped.
    pub fn mark(&mut self, stage: Stage, at: Instant) -> bool {
        let slot = &mut self.stamps[stage.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }

    /// When a stage was stamped.
    pub fn get(&self, stage: Stage) -> Option<Instant> {
        self.stamps[stage.index()]
    }

    /// Time since a stage was stamped.
    pub fn since(&self, stage: Stage, now: Instant) -> Option<Duration> {
        self.get(stage).map(|at| time::elapsed(at, now))
    }
}

// ============================================================================
// Request
// ============================================================================

/// One operation on its single pass through the pipeline.
pub struct Request {
    session_id: i64,
    cxid: i32,
    op_type: i32,
    payload: Option<RequestPayload>,
    connection: Option<ConnectionRef>,
    auth_info: Vec<Id>,
    created_at: Instant,

    txn_header: Option<TxnHeader>,
    txn_body: Option<TxnBody>,
    txn_digest: Option<TxnDigest>,
    zxid: Option<i64>,

    stage_times: StageTimes,
    owner: Option<RequestOwner>,
    error: Option<OperationError>,
    throttled: bool,
    local_session: Option<bool>,
    large_request_size: Option<u32>,
    quorum_verifier: Option<Arc<QuorumVerifier>>,
    poison: bool,
}

impl Request {
    fn blank(session_id: i64, cxid: i32, op_type: i32) -> Self {
        Self {
            session_id,
            cxid,
            op_type,
            payload: None,
            connection: None,
            auth_info: Vec::new(),
            created_at: Instant::now(),
            txn_header: None,
            txn_body: None,
            txn_digest: None,
            zxid: None,
            stage_times: StageTimes::default(),
            owner: None,
            error: None,
            throttled: false,
            local_session: None,
            large_request_size: None,
            quorum_verifier: None,
            poison: false,
        }
    }

    /// Build a request for an operation received from a client.
    ///
    /// Always succeeds; whether the operation is acceptable is checked
    /// separately with [`Request::is_valid_operation`].
    pub fn from_client(
        connection: Option<ConnectionRef>,
        session_id: i64,
        cxid: i32,
        op_type: i32,
        payload: Option<RequestPayload>,
        auth_info: Vec<Id>,
    ) -> Self {
        let mut request = Self::blank(session_id, cxid, op_type);
        request.connection = connection;
        request.payload = payload;
        request.auth_info = auth_info;
        request
    }

    /// Build a request for a transaction replicated from the leader.
    pub fn from_txn(
        session_id: i64,
        cxid: i32,
        op_type: i32,
        header: Option<TxnHeader>,
        body: Option<TxnBody>,
        zxid: i64,
    ) -> Self {
        let mut request = Self::blank(session_id, cxid, op_type);
        request.txn_header = header;
        request.txn_body = body;
        request.zxid = Some(zxid);
        request
    }

    /// Rebuild a request from a persisted transaction.
    ///
    /// Identity and zxid are taken from the header.
    pub fn from_persisted(header: TxnHeader, body: Option<TxnBody>, digest: Option<TxnDigest>) -> Self {
        let mut request = Self::blank(header.client_id, header.cxid, header.op_type);
        request.zxid = Some(header.zxid);
        request.txn_header = Some(header);
        request.txn_body = body;
        request.txn_digest = digest;
        request
    }

    /// Rebuild a request from a decoded log entry.
    pub fn from_txn_entry(entry: TxnEntry) -> Self {
        Self::from_persisted(entry.header, entry.body, entry.digest)
    }

    /// The shutdown sentinel. Stages that receive it stop instead of
    /// processing it.
    pub fn request_of_death() -> Self {
        let mut request = Self::blank(0, 0, 0);
        request.poison = true;
        request
    }

    /// Whether this is the shutdown sentinel.
    pub fn is_request_of_death(&self) -> bool {
        self.poison
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn cxid(&self) -> i32 {
        self.cxid
    }

    /// Raw operation code, possibly unrecognized.
    pub fn op_type(&self) -> i32 {
        self.op_type
    }

    /// Operation code, if recognized.
    pub fn op_code(&self) -> Option<OpCode> {
        OpCode::from_code(self.op_type)
    }

    pub fn auth_info(&self) -> &[Id] {
        &self.auth_info
    }

    /// Monotonic creation time.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The originating connection, if one was attached and is still alive.
    pub fn connection(&self) -> Option<Arc<dyn ServerConnection>> {
        self.connection.as_ref().and_then(ConnectionRef::upgrade)
    }

    /// Whether the request was attached to a connection at construction.
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    // ------------------------------------------------------------------
    // Payload
    // ------------------------------------------------------------------

    /// The client payload, absent on transaction and replay paths.
    pub fn payload(&self) -> Option<&RequestPayload> {
        self.payload.as_ref()
    }

    /// Decode the payload into a structured record.
    pub fn read_record<D: RecordDecoder>(&self, decoder: &D) -> RequestResult<D::Record> {
        match &self.payload {
            Some(payload) => payload.decode(decoder),
            None => Err(RequestError::PayloadUnavailable),
        }
    }

    /// Like [`Request::read_record`], for callers that treat a missing or
    /// undecodable payload as "no record".
    pub fn read_record_opt<D: RecordDecoder>(&self, decoder: &D) -> Option<D::Record> {
        self.read_record(decoder).ok()
    }

    /// Undecoded payload bytes.
    pub fn raw_payload_bytes(&self) -> Option<Bytes> {
        self.payload.as_ref().map(RequestPayload::bytes)
    }

    /// Lowercase hex dump of the payload for audit logs.
    pub fn payload_digest_hex(&self) -> String {
        match &self.payload {
            Some(payload) => payload.digest_hex(),
            None => NO_PAYLOAD_DIGEST.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------

    /// Whether the operation code is one clients may submit.
    pub fn is_valid_operation(&self) -> bool {
        opcode::is_valid(self.op_type)
    }

    /// Whether this request must go through quorum agreement.
    pub fn is_quorum_required(&self) -> bool {
        opcode::requires_quorum(self.op_type, self.is_local_session())
    }

    /// Whether admission control may delay this request.
    pub fn is_throttlable(&self) -> bool {
        opcode::is_throttlable(self.op_type)
    }

    /// Whether the request is no longer worth processing.
    ///
    /// Requests without a connection are never stale. `closeSession` is never
    /// stale so that session state can be cleaned up after the connection is
    /// gone. Otherwise, with the connection check on, a closed, invalid or
    /// released connection makes the request stale; with the latency check
    /// on, so does having waited longer than the session timeout.
    pub fn is_stale(&self, checks: &StaleChecks, now: Instant) -> bool {
        let Some(connection) = &self.connection else {
            return false;
        };

        if self.op_type == OpCode::CloseSession.code() {
            return false;
        }

        let live = connection.upgrade();

        if checks.connection_check() {
            match &live {
                None => return true,
                Some(conn) if conn.is_stale() || conn.is_invalid() => return true,
                Some(_) => {}
            }
        }

        if checks.latency_check() {
            if let Some(conn) = &live {
                return time::elapsed(self.created_at, now) > conn.session_timeout();
            }
        }

        false
    }

    /// Whether an earlier request on the same connection was dropped, so this
    /// one must be dropped too to keep per-connection ordering.
    ///
    /// A released connection was closed, not invalidated, so its requests are
    /// left to the stale check, which still lets `closeSession` through.
    pub fn must_drop(&self) -> bool {
        self.connection
            .as_ref()
            .and_then(ConnectionRef::upgrade)
            .is_some_and(|conn| conn.is_invalid())
    }

    // ------------------------------------------------------------------
    // Pipeline annotations
    // ------------------------------------------------------------------

    /// Whether the session this request creates or closes is local-only.
    pub fn is_local_session(&self) -> bool {
        self.local_session.unwrap_or(false)
    }

    /// Decide session locality. May be called once, before routing.
    pub fn set_local_session(&mut self, local: bool) -> RequestResult<()> {
        if self.local_session.is_some() {
            return Err(RequestError::LocalSessionAlreadySet);
        }
        self.local_session = Some(local);
        Ok(())
    }

    pub fn is_throttled(&self) -> bool {
        self.throttled
    }

    pub fn set_throttled(&mut self, throttled: bool) {
        self.throttled = throttled;
    }

    /// Payload size recorded by ingress for large requests.
    pub fn large_request_size(&self) -> Option<u32> {
        self.large_request_size
    }

    pub fn set_large_request_size(&mut self, size: u32) {
        self.large_request_size = Some(size);
    }

    pub fn owner(&self) -> Option<&RequestOwner> {
        self.owner.as_ref()
    }

    /// Record the stage responsible for completing this request. The first
    /// owner wins; returns `false` if one was already set.
    pub fn set_owner(&mut self, owner: RequestOwner) -> bool {
        if self.owner.is_some() {
            tracing::debug!(
                session_id = self.session_id,
                cxid = self.cxid,
                "request already owned"
            );
            return false;
        }
        self.owner = Some(owner);
        true
    }

    /// Whether the request was forwarded by a learner.
    pub fn is_replication_origin(&self) -> bool {
        self.owner
            .as_ref()
            .is_some_and(RequestOwner::is_replication_origin)
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    /// Record the client-visible failure. The first error wins; returns
    /// `false` if one was already recorded.
    pub fn set_error(&mut self, error: OperationError) -> bool {
        if let Some(existing) = &self.error {
            tracing::debug!(
                session_id = self.session_id,
                cxid = self.cxid,
                existing = %existing,
                ignored = %error,
                "request already failed"
            );
            return false;
        }
        self.error = Some(error);
        true
    }

    pub fn quorum_verifier(&self) -> Option<&Arc<QuorumVerifier>> {
        self.quorum_verifier.as_ref()
    }

    pub fn set_quorum_verifier(&mut self, qv: Arc<QuorumVerifier>) {
        self.quorum_verifier = Some(qv);
    }

    pub fn stage_times(&self) -> &StageTimes {
        &self.stage_times
    }

    /// Stamp a pipeline stage. Returns `false` if it was already stamped.
    pub fn mark_stage(&mut self, stage: Stage, at: Instant) -> bool {
        self.stage_times.mark(stage, at)
    }

    // ------------------------------------------------------------------
    // Agreed transaction
    // ------------------------------------------------------------------

    pub fn txn_header(&self) -> Option<&TxnHeader> {
        self.txn_header.as_ref()
    }

    pub fn txn_body(&self) -> Option<&TxnBody> {
        self.txn_body.as_ref()
    }

    pub fn txn_digest(&self) -> Option<&TxnDigest> {
        self.txn_digest.as_ref()
    }

    /// Sequence number, `None` until agreed.
    pub fn zxid(&self) -> Option<i64> {
        self.zxid
    }

    /// Attach the agreed transaction. Allowed once. The digest may be
    /// supplied here or attached later with [`Request::set_txn_digest`].
    pub fn set_txn(
        &mut self,
        header: TxnHeader,
        body: Option<TxnBody>,
        digest: Option<TxnDigest>,
    ) -> RequestResult<()> {
        if let Some(existing) = &self.txn_header {
            return Err(RequestError::TxnAlreadyAssigned {
                zxid: existing.zxid,
            });
        }
        self.zxid = Some(header.zxid);
        self.txn_header = Some(header);
        self.txn_body = body;
        self.txn_digest = digest;
        Ok(())
    }

    /// Attach the data tree digest computed after applying the transaction.
    ///
    /// Write-once, and only after the transaction header: returns `false`
    /// without changing anything when no header is set or a digest is
    /// already attached.
    pub fn set_txn_digest(&mut self, digest: TxnDigest) -> bool {
        if self.txn_header.is_none() || self.txn_digest.is_some() {
            tracing::debug!(
                session_id = self.session_id,
                cxid = self.cxid,
                zxid = ?self.zxid,
                "transaction digest not attached"
            );
            return false;
        }
        self.txn_digest = Some(digest);
        true
    }

    /// Encode the persisted log entry, propagating encoding failures.
    ///
    /// `Ok(None)` when the request never reached agreement.
    pub fn try_serialize_for_persistence(&self) -> RequestResult<Option<Vec<u8>>> {
        match &self.txn_header {
            Some(header) => txnlog::marshal_txn_entry(
                header,
                self.txn_body.as_ref(),
                self.txn_digest.as_ref(),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    /// Encode the persisted log entry.
    ///
    /// `None` when the request never reached agreement. An agreed
    /// transaction that fails to encode is a defect: it is logged and a
    /// zero-filled placeholder of [`ENCODE_FAILURE_PLACEHOLDER_LEN`] bytes
    /// is returned in its place. Callers that must not persist a placeholder
    /// use [`Request::try_serialize_for_persistence`].
    pub fn serialize_for_persistence(&self) -> Option<Vec<u8>> {
        match self.try_serialize_for_persistence() {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    zxid = ?self.zxid,
                    "agreed transaction failed to encode"
                );
                Some(vec![0u8; ENCODE_FAILURE_PLACEHOLDER_LEN])
            }
        }
    }

    // ------------------------------------------------------------------
    // Latency
    // ------------------------------------------------------------------

    fn txn_latency(&self, now_wall_ms: i64) -> Option<Duration> {
        let header = self.txn_header.as_ref()?;
        time::wall_latency(header.time, now_wall_ms)
    }

    /// Report time since the leader stamped the transaction header.
    ///
    /// Nothing is recorded without a header, or when the local wall clock is
    /// behind the header time. Returns the recorded latency.
    pub fn record_latency(
        &self,
        recorder: &dyn LatencyRecorder,
        now_wall_ms: i64,
    ) -> Option<Duration> {
        let latency = self.txn_latency(now_wall_ms)?;
        recorder.add(latency);
        Some(latency)
    }

    /// Keyed variant of [`Request::record_latency`].
    pub fn record_keyed_latency(
        &self,
        recorder: &dyn KeyedLatencyRecorder,
        key: &str,
        now_wall_ms: i64,
    ) -> Option<Duration> {
        let latency = self.txn_latency(now_wall_ms)?;
        recorder.add(key, latency);
        Some(latency)
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Comma-separated user ids for audit logs. Not a security control.
    pub fn audit_users(&self) -> Option<String> {
        auth::audit_users(&self.auth_info)
    }

    /// Best-effort path of the request, `None` if the operation has no
    /// leading path or it cannot be read.
    pub fn request_path(&self) -> Option<String> {
        let carries_path = self
            .op_code()
            .map_or(true, OpCode::carries_leading_path);
        if !carries_path {
            return None;
        }
        let payload = self.payload.as_ref()?;
        payload::extract_path(payload.as_slice()).ok()
    }

    /// One-line diagnostic rendering.
    pub fn describe(&self) -> String {
        let zxid = self
            .txn_header
            .as_ref()
            .map(|h| format!("0x{:x}", h.zxid))
            .unwrap_or_else(|| UNASSIGNED_ZXID.to_string());
        let txn_type = self
            .txn_header
            .as_ref()
            .map(|h| h.op_type.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let path = self
            .request_path()
            .unwrap_or_else(|| UNKNOWN_PATH.to_string());

        format!(
            "sessionid:0x{:x} type:{} cxid:0x{:x} zxid:{} txntype:{} reqpath:{}",
            self.session_id,
            opcode::op_name(self.op_type),
            i64::from(self.cxid),
            zxid,
            txn_type,
            path
        )
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("session_id", &self.session_id)
            .field("cxid", &self.cxid)
            .field("op_type", &self.op_type)
            .field("zxid", &self.zxid)
            .field("has_payload", &self.payload.is_some())
            .field("connection", &self.connection)
            .field("owner", &self.owner)
            .field("error", &self.error)
            .field("throttled", &self.throttled)
            .field("poison", &self.poison)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::TrackedConnection;

    fn client(op: OpCode) -> Request {
        Request::from_client(None, 0x1234, 7, op.code(), None, Vec::new())
    }

    #[test]
    fn stage_stamps_are_write_once() {
        let mut request = client(OpCode::GetData);
        let first = Instant::now();
        let later = first + Duration::from_millis(10);

        assert!(request.mark_stage(Stage::PrepQueue, first));
        assert!(!request.mark_stage(Stage::PrepQueue, later));
        assert_eq!(request.stage_times().get(Stage::PrepQueue), Some(first));
        assert_eq!(
            request.stage_times().since(Stage::PrepQueue, later),
            Some(Duration::from_millis(10))
        );
        assert_eq!(request.stage_times().get(Stage::SyncQueue), None);
    }

    #[test]
    fn local_session_is_decided_once() {
        let mut request = client(OpCode::CreateSession);
        assert!(request.is_quorum_required());
        request.set_local_session(true).unwrap();
        assert!(!request.is_quorum_required());
        assert!(matches!(
            request.set_local_session(false),
            Err(RequestError::LocalSessionAlreadySet)
        ));
        assert!(request.is_local_session());
    }

    #[test]
    fn first_error_and_owner_win() {
        use crate::core::error::ErrorCode;

        let mut request = client(OpCode::SetData);
        assert!(request.set_error(OperationError::new(ErrorCode::NoNode)));
        assert!(!request.set_error(OperationError::new(ErrorCode::BadVersion)));
        assert_eq!(request.error().map(|e| e.code), Some(ErrorCode::NoNode));

        assert!(request.set_owner(RequestOwner::Local));
        assert!(!request.set_owner(RequestOwner::Local));
        assert!(!request.is_replication_origin());
    }

    #[test]
    fn released_connection_is_stale_but_not_dropped() {
        let conn = Arc::new(TrackedConnection::new(1, Duration::from_secs(10)));
        let request = Request::from_client(
            Some(ConnectionRef::new(&conn)),
            1,
            1,
            OpCode::GetData.code(),
            None,
            Vec::new(),
        );
        assert!(!request.must_drop());
        drop(conn);
        assert!(!request.must_drop());
        assert!(request.connection().is_none());
        assert!(request.has_connection());

        let checks = StaleChecks::new(true, false);
        assert!(request.is_stale(&checks, Instant::now()));

        let conn = Arc::new(TrackedConnection::new(2, Duration::from_secs(10)));
        let close = Request::from_client(
            Some(ConnectionRef::new(&conn)),
            2,
            1,
            OpCode::CloseSession.code(),
            None,
            Vec::new(),
        );
        drop(conn);
        assert!(!close.must_drop());
        assert!(!close.is_stale(&checks, Instant::now()));
    }

    #[test]
    fn request_of_death_is_recognizable() {
        let pill = Request::request_of_death();
        assert!(pill.is_request_of_death());
        assert_eq!(pill.session_id(), 0);
        assert_eq!(pill.cxid(), 0);
        assert!(pill.payload().is_none());
        assert!(!pill.has_connection());
        assert!(!client(OpCode::Ping).is_request_of_death());
    }

    #[test]
    fn describe_renders_negative_cxid_as_64_bit_hex() {
        let request = Request::from_client(None, 1, -1, OpCode::Ping.code(), None, Vec::new());
        assert!(request
            .describe()
            .contains("cxid:0xffffffffffffffff"));
    }
}
