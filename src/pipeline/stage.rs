//! Stage hand-off.
//!
//! Each stage owns the receiving end of a bounded queue and drives requests
//! through its [`RequestProcessor`] one at a time. Before a request reaches
//! the processor the driver abandons it if ordering requires a drop or if it
//! has gone stale. The shutdown sentinel ends the loop.

use crate::core::config::StaleChecks;
use crate::core::error::{RequestError, RequestResult};
use crate::ops::observability::{LatencyRecorder, RequestMetrics};
use crate::request::{Request, Stage};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Work performed by one pipeline stage.
pub trait RequestProcessor: Send + 'static {
    /// Handle one request. The processor takes ownership and is responsible
    /// for forwarding it or bringing it to a terminal state.
    fn process_request(&mut self, request: Request);

    /// Called once after the stage stops accepting requests.
    fn shutdown(&mut self) {}
}

/// Static description of a stage.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Stage name for logs.
    pub name: String,
    /// Timestamp recorded when a request is queued for this stage.
    pub queue_stamp: Option<Stage>,
    /// Timestamp recorded when this stage starts on a request.
    pub start_stamp: Option<Stage>,
}

impl StageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue_stamp: None,
            start_stamp: None,
        }
    }

    pub fn with_queue_stamp(mut self, stage: Stage) -> Self {
        self.queue_stamp = Some(stage);
        self
    }

    pub fn with_start_stamp(mut self, stage: Stage) -> Self {
        self.start_stamp = Some(stage);
        self
    }
}

/// Counts reported when a stage stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSummary {
    pub processed: u64,
    pub stale_dropped: u64,
    pub must_dropped: u64,
}

/// Sending side of a stage queue.
#[derive(Debug, Clone)]
pub struct StageHandle {
    name: String,
    queue_stamp: Option<Stage>,
    tx: mpsc::Sender<Request>,
}

impl StageHandle {
    /// Stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a request, waiting for capacity.
    pub async fn submit(&self, mut request: Request) -> RequestResult<()> {
        if let Some(stage) = self.queue_stamp {
            request.mark_stage(stage, Instant::now());
        }
        self.tx
            .send(request)
            .await
            .map_err(|_| RequestError::StageClosed {
                stage: self.name.clone(),
            })
    }

    /// Ask the stage to stop after draining what is already queued.
    pub async fn shutdown(&self) -> RequestResult<()> {
        self.tx
            .send(Request::request_of_death())
            .await
            .map_err(|_| RequestError::StageClosed {
                stage: self.name.clone(),
            })
    }
}

fn queue_summary(metrics: &RequestMetrics, stage: Stage) -> Option<&dyn LatencyRecorder> {
    match stage {
        Stage::PrepQueue => Some(&metrics.prep_queue_time),
        Stage::CommitQueue => Some(&metrics.commit_queue_time),
        Stage::SyncQueue => Some(&metrics.sync_queue_time),
        _ => None,
    }
}

/// Start a stage on the current tokio runtime.
pub fn spawn_stage<P: RequestProcessor>(
    spec: StageSpec,
    capacity: usize,
    processor: P,
    checks: Arc<StaleChecks>,
    metrics: Arc<RequestMetrics>,
) -> (StageHandle, JoinHandle<StageSummary>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = StageHandle {
        name: spec.name.clone(),
        queue_stamp: spec.queue_stamp,
        tx,
    };
    let task = tokio::spawn(run_stage(spec, rx, processor, checks, metrics));
    (handle, task)
}

/// Drive a stage until the shutdown sentinel arrives or every sender is gone.
pub async fn run_stage<P: RequestProcessor>(
    spec: StageSpec,
    mut rx: mpsc::Receiver<Request>,
    mut processor: P,
    checks: Arc<StaleChecks>,
    metrics: Arc<RequestMetrics>,
) -> StageSummary {
    let mut summary = StageSummary::default();
    tracing::debug!(stage = %spec.name, "stage started");

    while let Some(mut request) = rx.recv().await {
        if request.is_request_of_death() {
            tracing::info!(stage = %spec.name, "shutdown requested");
            break;
        }

        if request.must_drop() {
            metrics.inc_must_drop();
            summary.must_dropped += 1;
            tracing::debug!(stage = %spec.name, request = %request, "dropping request to preserve ordering");
            continue;
        }

        let now = Instant::now();
        if request.is_stale(&checks, now) {
            metrics.inc_stale_dropped();
            summary.stale_dropped += 1;
            tracing::debug!(stage = %spec.name, request = %request, "dropping stale request");
            continue;
        }

        if let Some(queued) = spec.queue_stamp {
            if let (Some(waited), Some(recorder)) = (
                request.stage_times().since(queued, now),
                queue_summary(&metrics, queued),
            ) {
                recorder.add(waited);
            }
        }
        if let Some(started) = spec.start_stamp {
            request.mark_stage(started, now);
        }

        processor.process_request(request);
        summary.processed += 1;
    }

    processor.shutdown();
    tracing::debug!(
        stage = %spec.name,
        processed = summary.processed,
        stale_dropped = summary.stale_dropped,
        must_dropped = summary.must_dropped,
        "stage stopped"
    );
    summary
}
