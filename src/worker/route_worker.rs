//! Per-route refresh and response loop.
//!
//! # Responsibilities
//! - Own one cache entity; nothing else reads or writes it
//! - Wake on the first queued request or on the jittered idle timeout
//! - Refresh, then answer every request batched in the cycle with the same bytes
//! - Replace the entity wholesale when the upstream session expires
//!
//! # State Machine
//! ```text
//! Waiting ──request / timeout──▶ Refreshing ──▶ Responding ──▶ Waiting
//!    │                                │
//!    └──shutdown / queue closed──▶ Stopped
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::cache::{CacheEntity, RefreshOutcome};
use crate::observability::metrics;
use crate::queue::{wait_queue, Dequeued, Enqueuer, WaitQueue};
use crate::upstream::DocumentService;
use crate::worker::schedule::RefreshSchedule;

/// Returned by [`WorkerHandle::serve`] once the loop has exited.
#[derive(Debug, Clone, Error)]
#[error("worker for route `{0}` has already stopped")]
pub struct WorkerStopped(pub Arc<str>);

/// A request waiting for the next cycle's artifact.
#[derive(Debug)]
pub struct PendingRequest {
    reply: oneshot::Sender<Bytes>,
    received_at: Instant,
}

impl PendingRequest {
    /// Create a pending request and the receiver its response arrives on.
    pub fn new() -> (Self, oneshot::Receiver<Bytes>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                reply,
                received_at: Instant::now(),
            },
            rx,
        )
    }

    /// Deliver the artifact. Returns false if the requester went away.
    fn respond(self, bytes: Bytes) -> bool {
        self.reply.send(bytes).is_ok()
    }
}

/// Cheap, cloneable handle used by the transport to reach a worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    route: Arc<str>,
    queue: Enqueuer<PendingRequest>,
}

impl WorkerHandle {
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Hand a request to the worker.
    pub fn serve(&self, request: PendingRequest) -> Result<(), WorkerStopped> {
        self.queue
            .enqueue(request)
            .map_err(|_| WorkerStopped(self.route.clone()))
    }

    /// Enqueue a request and wait for the artifact of the cycle that picks it up.
    pub async fn fetch(&self) -> Result<Bytes, WorkerStopped> {
        let (request, rx) = PendingRequest::new();
        self.serve(request)?;
        rx.await.map_err(|_| WorkerStopped(self.route.clone()))
    }

    /// True once the worker loop has exited.
    pub fn is_stopped(&self) -> bool {
        self.queue.is_closed()
    }
}

/// Worker loop state. Created by [`spawn`].
pub struct RouteWorker<S: DocumentService> {
    entity: CacheEntity<S>,
    queue: WaitQueue<PendingRequest>,
    schedule: RefreshSchedule,
    session_timeout: Duration,
    shutdown: broadcast::Receiver<()>,
}

/// Start the loop for `entity` and return its handle.
pub fn spawn<S: DocumentService>(
    entity: CacheEntity<S>,
    schedule: RefreshSchedule,
    session_timeout: Duration,
    shutdown: broadcast::Receiver<()>,
) -> (WorkerHandle, JoinHandle<()>) {
    let (enqueuer, queue) = wait_queue();
    let handle = WorkerHandle {
        route: Arc::from(entity.route()),
        queue: enqueuer,
    };

    let worker = RouteWorker {
        entity,
        queue,
        schedule,
        session_timeout,
        shutdown,
    };
    let task = tokio::spawn(worker.run());

    (handle, task)
}

impl<S: DocumentService> RouteWorker<S> {
    pub async fn run(mut self) {
        tracing::debug!(route = %self.entity.route(), "Route worker started");

        loop {
            let timeout = self.schedule.next_timeout();
            let woke = tokio::select! {
                dequeued = self.queue.dequeue(timeout) => dequeued,
                _ = self.shutdown.recv() => {
                    tracing::info!(route = %self.entity.route(), "Route worker received shutdown signal, exiting loop");
                    break;
                }
            };

            let first = match woke {
                Dequeued::Item(request) => Some(request),
                Dequeued::TimedOut => {
                    tracing::debug!(route = %self.entity.route(), "Idle timeout, running background refresh");
                    None
                }
                Dequeued::Closed => {
                    tracing::info!(route = %self.entity.route(), "All handles dropped, exiting loop");
                    break;
                }
            };

            self.refresh().await;

            let mut batch: Vec<PendingRequest> = first.into_iter().collect();
            batch.extend(self.queue.drain_all());
            self.respond(batch);
        }
    }

    async fn refresh(&mut self) {
        let start = Instant::now();
        let route = self.entity.route().to_string();

        match self.entity.refresh().await {
            Ok(outcome) => {
                metrics::record_refresh(&route, outcome.label(), start);
                log_outcome(&route, &outcome);
            }
            Err(e) if e.is_auth_expired() => {
                metrics::record_refresh(&route, "auth_expired", start);
                tracing::warn!(route = %route, error = %e, "Upstream session expired, recreating");
                self.recreate().await;
            }
            Err(e) => {
                metrics::record_refresh(&route, "error", start);
                tracing::error!(route = %route, error = %e, "Refresh failed, serving cached artifact");
            }
        }

        metrics::record_cached_revision(&route, self.entity.artifact().revision);
    }

    /// Build a fresh entity for the same route and target. The old one stays
    /// in place until the replacement is complete.
    async fn recreate(&mut self) {
        let replacement = CacheEntity::create(
            self.entity.service().clone(),
            self.entity.route(),
            self.entity.target().clone(),
            self.session_timeout,
        )
        .await;

        match replacement {
            Ok(entity) => {
                tracing::info!(
                    route = %entity.route(),
                    revision = entity.artifact().revision,
                    "Session recreated"
                );
                metrics::record_session_recreate(entity.route(), true);
                self.entity = entity;
            }
            Err(e) => {
                tracing::error!(
                    route = %self.entity.route(),
                    error = %e,
                    "Session recreation failed, keeping stale artifact"
                );
                metrics::record_session_recreate(self.entity.route(), false);
            }
        }
    }

    fn respond(&self, batch: Vec<PendingRequest>) {
        if batch.is_empty() {
            return;
        }

        let route = self.entity.route();
        let bytes = &self.entity.artifact().bytes;
        metrics::record_batch(route, batch.len());

        for request in batch {
            let waited = request.received_at.elapsed();
            if !request.respond(bytes.clone()) {
                tracing::debug!(route = %route, waited = ?waited, "Requester went away before response");
            }
        }
    }
}

fn log_outcome(route: &str, outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Hit { revision } => {
            tracing::debug!(route = %route, revision, "Cache hit");
        }
        RefreshOutcome::Compiled { revision } => {
            tracing::info!(route = %route, revision, "Compiled new revision");
        }
        RefreshOutcome::Anomaly { .. } => {
            // Already reported by the entity.
        }
        RefreshOutcome::PersistentFailure { revision, reason } => {
            tracing::warn!(
                route = %route,
                revision,
                reason = %reason,
                "Revision cannot compile, serving previous artifact"
            );
        }
        RefreshOutcome::TransientFailure { revision, status } => {
            tracing::warn!(
                route = %route,
                revision,
                status = %status,
                "Compile did not complete, will retry this revision"
            );
        }
    }
}
