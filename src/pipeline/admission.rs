//! Admission control applied at ingress.
//!
//! [`LargeRequestGate`] bounds the bytes held by large requests that are
//! still in flight. [`OutstandingLimiter`] marks throttlable requests once too
//! many are outstanding; session lifecycle and pings are always admitted.

use crate::core::config::RequestConfig;
use crate::core::error::{ErrorCode, OperationError};
use crate::ops::observability::RequestMetrics;
use crate::request::Request;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Tracks in-flight bytes of requests above the large-request threshold.
#[derive(Debug)]
pub struct LargeRequestGate {
    threshold: Option<u32>,
    max_bytes: u64,
    in_flight: AtomicU64,
    metrics: Arc<RequestMetrics>,
}

impl LargeRequestGate {
    pub fn new(threshold: Option<u32>, max_bytes: u64, metrics: Arc<RequestMetrics>) -> Self {
        Self {
            threshold,
            max_bytes,
            in_flight: AtomicU64::new(0),
            metrics,
        }
    }

    pub fn from_config(config: &RequestConfig, metrics: Arc<RequestMetrics>) -> Self {
        Self::new(
            config.large_request_threshold,
            config.large_request_max_bytes,
            metrics,
        )
    }

    /// Whether a payload of `size` bytes counts as large.
    pub fn is_large(&self, size: usize) -> bool {
        self.threshold
            .is_some_and(|threshold| size > threshold as usize)
    }

    /// Bytes currently held by admitted large requests.
    pub fn in_flight_bytes(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Account for a newly received request.
    ///
    /// Large requests reserve their size and have it recorded on the
    /// envelope. A large request that would push the in-flight total past the
    /// limit is refused with [`ErrorCode::Throttled`] and nothing is
    /// reserved.
    pub fn admit(&self, request: &mut Request) -> Result<(), OperationError> {
        let size = request.payload().map_or(0, |p| p.len());
        if !self.is_large(size) {
            return Ok(());
        }
        let size = u32::try_from(size).unwrap_or(u32::MAX);

        let reserved = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = current.saturating_add(u64::from(size));
                (next <= self.max_bytes).then_some(next)
            });

        match reserved {
            Ok(previous) => {
                request.set_large_request_size(size);
                tracing::trace!(
                    size,
                    in_flight = previous + u64::from(size),
                    "large request admitted"
                );
                Ok(())
            }
            Err(current) => {
                self.metrics.inc_large_rejected();
                tracing::warn!(
                    size,
                    in_flight = current,
                    max_bytes = self.max_bytes,
                    "large request rejected, in-flight limit reached"
                );
                Err(OperationError::new(ErrorCode::Throttled))
            }
        }
    }

    /// Release the reservation held by a finished request.
    pub fn finish(&self, request: &Request) {
        if let Some(size) = request.large_request_size() {
            let _ = self
                .in_flight
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    Some(current.saturating_sub(u64::from(size)))
                });
        }
    }
}

/// Caps outstanding throttlable requests.
#[derive(Debug)]
pub struct OutstandingLimiter {
    max_outstanding: usize,
    outstanding: AtomicUsize,
    metrics: Arc<RequestMetrics>,
}

impl OutstandingLimiter {
    pub fn new(max_outstanding: usize, metrics: Arc<RequestMetrics>) -> Self {
        Self {
            max_outstanding,
            outstanding: AtomicUsize::new(0),
            metrics,
        }
    }

    /// Requests currently counted as outstanding.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Count a request in. Returns `false` and marks it throttled when the
    /// limit is reached; non-throttlable requests are always counted in.
    pub fn admit(&self, request: &mut Request) -> bool {
        let previous = self.outstanding.fetch_add(1, Ordering::AcqRel);
        if previous < self.max_outstanding || !request.is_throttlable() {
            return true;
        }
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        request.set_throttled(true);
        self.metrics.inc_throttled();
        false
    }

    /// Count a completed request out.
    pub fn release(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::payload::RequestPayload;
    use crate::request::OpCode;

    fn request_of(op: OpCode, size: usize) -> Request {
        Request::from_client(
            None,
            1,
            1,
            op.code(),
            Some(RequestPayload::new(vec![0u8; size])),
            Vec::new(),
        )
    }

    #[test]
    fn small_requests_pass_untracked() {
        let gate = LargeRequestGate::new(Some(100), 1_000, Arc::new(RequestMetrics::new()));
        let mut request = request_of(OpCode::SetData, 100);
        gate.admit(&mut request).unwrap();
        assert_eq!(request.large_request_size(), None);
        assert_eq!(gate.in_flight_bytes(), 0);
    }

    #[test]
    fn disabled_threshold_tracks_nothing() {
        let gate = LargeRequestGate::new(None, 10, Arc::new(RequestMetrics::new()));
        let mut request = request_of(OpCode::SetData, 1_000);
        gate.admit(&mut request).unwrap();
        assert_eq!(request.large_request_size(), None);
    }

    #[test]
    fn large_requests_reserve_until_finished() {
        let metrics = Arc::new(RequestMetrics::new());
        let gate = LargeRequestGate::new(Some(100), 500, metrics.clone());

        let mut first = request_of(OpCode::SetData, 300);
        gate.admit(&mut first).unwrap();
        assert_eq!(first.large_request_size(), Some(300));
        assert_eq!(gate.in_flight_bytes(), 300);

        let mut second = request_of(OpCode::Create, 250);
        let err = gate.admit(&mut second).unwrap_err();
        assert_eq!(err.code, ErrorCode::Throttled);
        assert_eq!(second.large_request_size(), None);
        assert_eq!(metrics.large_rejected(), 1);

        gate.finish(&first);
        assert_eq!(gate.in_flight_bytes(), 0);
        gate.admit(&mut second).unwrap();
        assert_eq!(gate.in_flight_bytes(), 250);
    }

    #[test]
    fn limiter_never_throttles_session_lifecycle() {
        let metrics = Arc::new(RequestMetrics::new());
        let limiter = OutstandingLimiter::new(1, metrics.clone());

        let mut read = request_of(OpCode::GetData, 0);
        assert!(limiter.admit(&mut read));

        let mut write = request_of(OpCode::SetData, 0);
        assert!(!limiter.admit(&mut write));
        assert!(write.is_throttled());

        for op in [OpCode::Ping, OpCode::CreateSession, OpCode::CloseSession] {
            let mut request = request_of(op, 0);
            assert!(limiter.admit(&mut request), "{} must not be throttled", op);
            assert!(!request.is_throttled());
        }
        assert_eq!(metrics.throttled(), 1);
        assert_eq!(limiter.outstanding(), 4);

        limiter.release();
        assert_eq!(limiter.outstanding(), 3);
    }
}
