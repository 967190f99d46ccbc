//! Client connection collaborator.
//!
//! Requests hold connections weakly and only ever ask them about liveness.
//! Connection state can change on the I/O thread while a request is inside
//! the pipeline, so every query reads the live value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// What a request needs to know about the connection it arrived on.
pub trait ServerConnection: Send + Sync {
    /// The connection has been closed or is being torn down.
    fn is_stale(&self) -> bool;

    /// A request on this connection was dropped, so later ones must be too.
    fn is_invalid(&self) -> bool;

    /// Negotiated session timeout for the session bound to this connection.
    fn session_timeout(&self) -> Duration;
}

/// Non-owning reference from a request to its connection.
///
/// Holding one never keeps a closed connection alive.
#[derive(Clone)]
pub struct ConnectionRef(Weak<dyn ServerConnection>);

impl ConnectionRef {
    /// Reference a concrete connection.
    pub fn new<C: ServerConnection + 'static>(connection: &Arc<C>) -> Self {
        let weak: Weak<C> = Arc::downgrade(connection);
        Self(weak)
    }

    /// Reference a type-erased connection.
    pub fn from_dyn(connection: &Arc<dyn ServerConnection>) -> Self {
        Self(Arc::downgrade(connection))
    }

    /// The connection, if it is still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn ServerConnection>> {
        self.0.upgrade()
    }

    /// Whether the connection has already been released.
    pub fn is_released(&self) -> bool {
        self.0.strong_count() == 0
    }
}

impl std::fmt::Debug for ConnectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRef")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Connection state tracked with atomics, shared between the I/O side that
/// updates it and pipeline stages that read it.
#[derive(Debug)]
pub struct TrackedConnection {
    id: u64,
    stale: AtomicBool,
    invalid: AtomicBool,
    session_timeout_ms: AtomicU64,
}

impl TrackedConnection {
    /// Create a live connection.
    pub fn new(id: u64, session_timeout: Duration) -> Self {
        Self {
            id,
            stale: AtomicBool::new(false),
            invalid: AtomicBool::new(false),
            session_timeout_ms: AtomicU64::new(session_timeout.as_millis() as u64),
        }
    }

    /// Connection identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark the connection closed.
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Mark the connection invalid after a request on it was dropped.
    pub fn invalidate(&self) {
        if !self.invalid.swap(true, Ordering::AcqRel) {
            tracing::debug!(connection = self.id, "connection invalidated");
        }
    }

    /// Update the negotiated session timeout.
    pub fn set_session_timeout(&self, timeout: Duration) {
        self.session_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Release);
    }
}

impl ServerConnection for TrackedConnection {
    fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    fn is_invalid(&self) -> bool {
        self.invalid.load(Ordering::Acquire)
    }

    fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions_are_visible() {
        let conn = TrackedConnection::new(7, Duration::from_secs(30));
        assert!(!conn.is_stale());
        assert!(!conn.is_invalid());
        assert_eq!(conn.session_timeout(), Duration::from_secs(30));

        conn.mark_stale();
        conn.invalidate();
        conn.set_session_timeout(Duration::from_secs(4));
        assert!(conn.is_stale());
        assert!(conn.is_invalid());
        assert_eq!(conn.session_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn references_do_not_extend_lifetime() {
        let conn = Arc::new(TrackedConnection::new(1, Duration::from_secs(1)));
        let reference = ConnectionRef::new(&conn);
        assert!(reference.upgrade().is_some());
        assert!(!reference.is_released());

        drop(conn);
        assert!(reference.upgrade().is_none());
        assert!(reference.is_released());
    }
}
