//! Worker pool that runs router pipelines.
//!
//! The [`Dispatcher`] owns a fixed set of persistent workers, each draining
//! its own bounded queue. A request is always sent to worker
//! `conn_id % worker_count`, so every request from one connection is handled
//! by the same worker in arrival order, while different connections proceed
//! in parallel. This sharding is the framework's only ordering guarantee and
//! removes any need for per-connection locks.
//!
//! With zero workers the dispatcher runs in inline mode: the pipeline is
//! executed directly on the submitting reader pump.

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use log::{debug, error, warn};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    connection::ConnectionId,
    fault::{HandlerFault, HookStage},
    metrics,
    request::Request,
    router::{Router, Routes},
};

/// What [`Dispatcher::submit`] does when the target worker queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFullPolicy {
    /// Wait for room, throttling the submitting reader.
    #[default]
    Block,
    /// Fail immediately with [`SubmitError::QueueFull`].
    Reject,
}

/// Worker pool sizing and policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Number of persistent workers. Zero selects inline mode.
    pub workers: usize,
    /// Capacity of each worker's queue.
    pub queue_capacity: usize,
    /// Behaviour when a queue is full.
    pub queue_full: QueueFullPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_capacity: 1024,
            queue_full: QueueFullPolicy::Block,
        }
    }
}

/// Errors returned by [`Dispatcher::submit`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The worker queue was full and the policy is [`QueueFullPolicy::Reject`].
    #[error("worker {worker} queue full")]
    QueueFull {
        /// Index of the saturated worker.
        worker: usize,
    },
    /// The request's connection stopped while waiting for queue room.
    #[error("connection closed while waiting for a worker")]
    ConnectionClosed,
    /// The worker pool has shut down.
    #[error("worker pool closed")]
    PoolClosed,
}

/// Outcome of running one request through its router.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// No router is bound to the message identifier.
    #[error("no router for msg_id={msg_id} on {conn_id}")]
    UnknownRoute {
        /// Connection the request arrived on.
        conn_id: ConnectionId,
        /// Unbound message identifier.
        msg_id: u32,
    },
    /// A hook panicked.
    #[error(transparent)]
    Fault(#[from] HandlerFault),
}

struct DispatcherInner {
    routes: Arc<Routes>,
    queues: Vec<mpsc::Sender<Request>>,
    policy: QueueFullPolicy,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

/// Cloneable handle to the worker pool.
#[derive(Clone)]
pub struct Dispatcher(Arc<DispatcherInner>);

impl Dispatcher {
    /// Spawn the workers and return a handle for submitting requests.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while `config.workers > 0`.
    #[must_use]
    pub fn start(routes: Arc<Routes>, config: DispatchConfig) -> Self {
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let capacity = config.queue_capacity.max(1);
        let queues = (0..config.workers)
            .map(|index| {
                let (tx, rx) = mpsc::channel(capacity);
                tracker.spawn(worker_loop(
                    index,
                    rx,
                    Arc::clone(&routes),
                    shutdown.clone(),
                ));
                tx
            })
            .collect();
        tracker.close();
        debug!(
            "worker pool started: workers={}, queue_capacity={capacity}, policy={:?}",
            config.workers, config.queue_full
        );
        Self(Arc::new(DispatcherInner {
            routes,
            queues,
            policy: config.queue_full,
            shutdown,
            tracker,
        }))
    }

    /// Number of persistent workers; zero in inline mode.
    #[must_use]
    pub fn worker_count(&self) -> usize { self.0.queues.len() }

    /// The frozen route table.
    #[must_use]
    pub fn routes(&self) -> &Routes { &self.0.routes }

    /// Worker that handles every request from `id`, or `None` in inline mode.
    #[must_use]
    pub fn worker_index(&self, id: ConnectionId) -> Option<usize> {
        worker_index(id, self.worker_count())
    }

    /// Hand a request to its connection's worker.
    ///
    /// In inline mode the pipeline runs to completion before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::QueueFull`] when the queue is full under
    /// [`QueueFullPolicy::Reject`], [`SubmitError::ConnectionClosed`] if the
    /// connection stops while waiting for room under
    /// [`QueueFullPolicy::Block`], and [`SubmitError::PoolClosed`] after
    /// [`Dispatcher::shutdown`].
    pub async fn submit(&self, request: Request) -> Result<(), SubmitError> {
        let Some(index) = self.worker_index(request.connection().id()) else {
            report(dispatch(&self.0.routes, request).await);
            return Ok(());
        };
        let tx = self.0.queues.get(index).ok_or(SubmitError::PoolClosed)?;
        match self.0.policy {
            QueueFullPolicy::Block => {
                let exit = request.connection().exit_signal().clone();
                tokio::select! {
                    biased;

                    res = tx.send(request) => res.map_err(|_| SubmitError::PoolClosed),
                    () = exit.cancelled() => Err(SubmitError::ConnectionClosed),
                }
            }
            QueueFullPolicy::Reject => tx.try_send(request).map_err(|e| match e {
                TrySendError::Full(_) => SubmitError::QueueFull { worker: index },
                TrySendError::Closed(_) => SubmitError::PoolClosed,
            }),
        }
    }

    /// Stop every worker after its in-flight request and wait for them to exit.
    ///
    /// Requests still queued are discarded.
    pub async fn shutdown(&self) {
        self.0.shutdown.cancel();
        self.0.tracker.wait().await;
        debug!("worker pool stopped");
    }
}

/// Shard a connection onto a worker.
pub(crate) fn worker_index(id: ConnectionId, workers: usize) -> Option<usize> {
    let workers = u64::try_from(workers).ok().filter(|n| *n > 0)?;
    usize::try_from(id.as_u64() % workers).ok()
}

async fn worker_loop(
    index: usize,
    mut rx: mpsc::Receiver<Request>,
    routes: Arc<Routes>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            biased;

            () = shutdown.cancelled() => break,
            req = rx.recv() => match req {
                Some(req) => req,
                None => break,
            },
        };
        report(dispatch(&routes, request).await);
    }
    debug!("worker exiting: index={index}");
}

/// Run `request` through the router bound to its message identifier.
///
/// Hooks run in order `pre_handle`, `handle`, `post_handle`. A panic in one
/// hook abandons the remaining hooks for this request only.
///
/// # Errors
///
/// Returns [`DispatchError::UnknownRoute`] if no router is bound and
/// [`DispatchError::Fault`] if a hook panicked.
pub async fn dispatch(routes: &Routes, request: Request) -> Result<(), DispatchError> {
    let Some(router) = routes.get(request.msg_id()) else {
        return Err(DispatchError::UnknownRoute {
            conn_id: request.connection().id(),
            msg_id: request.msg_id(),
        });
    };
    run_pipeline(router.as_ref(), &request).await?;
    Ok(())
}

async fn run_pipeline(router: &dyn Router, request: &Request) -> Result<(), HandlerFault> {
    run_stage(HookStage::PreHandle, request, router.pre_handle(request)).await?;
    run_stage(HookStage::Handle, request, router.handle(request)).await?;
    run_stage(HookStage::PostHandle, request, router.post_handle(request)).await
}

async fn run_stage<Fut>(stage: HookStage, request: &Request, hook: Fut) -> Result<(), HandlerFault>
where
    Fut: Future<Output = ()>,
{
    AssertUnwindSafe(hook).catch_unwind().await.map_err(|payload| {
        HandlerFault::from_panic(
            request.connection().id(),
            request.msg_id(),
            stage,
            payload.as_ref(),
        )
    })
}

fn report(outcome: Result<(), DispatchError>) {
    match outcome {
        Ok(()) => {}
        Err(DispatchError::UnknownRoute { conn_id, msg_id }) => {
            metrics::inc_errors();
            warn!("no router for message id: msg_id={msg_id}, conn_id={conn_id}");
            tracing::warn!(msg_id, %conn_id, "no router for message id");
        }
        Err(DispatchError::Fault(fault)) => {
            metrics::inc_handler_faults();
            // Emit via both `log` and `tracing` for tests that capture either.
            error!(
                "router hook panicked: stage={}, msg_id={}, conn_id={}, panic={}",
                fault.stage, fault.msg_id, fault.conn_id, fault.message
            );
            tracing::error!(
                stage = %fault.stage,
                msg_id = fault.msg_id,
                conn_id = %fault.conn_id,
                panic = %fault.message,
                "router hook panicked"
            );
        }
    }
}
