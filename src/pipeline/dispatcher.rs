use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::in_flight::InFlight;
use super::worker::{IdleSlot, Worker};
use super::{Job, Processor, Request};
use crate::config::PipelineConfig;
use crate::PipelineError;

/// How one attempt to hand a request to a dispatcher ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The request is in the dispatcher's queue.
    Delivered,
    /// The queue stayed full for the whole timeout.
    TimedOut,
    /// The broadcast was cancelled first.
    Cancelled,
    /// The dispatcher has stopped and no longer reads its queue.
    Closed,
}

/// Routes queued requests to idle workers.
///
/// The inbound queue is bounded; the idle pool holds at most one slot per
/// worker and so doubles as a counting semaphore over busy workers.
#[derive(Debug)]
pub struct Dispatcher {
    max_workers: usize,
    queue_tx: mpsc::Sender<Job>,
    queue_rx: Mutex<Option<mpsc::Receiver<Job>>>,
    pool_tx: mpsc::Sender<IdleSlot>,
    pool_rx: Arc<AsyncMutex<mpsc::Receiver<IdleSlot>>>,
    workers: Mutex<Vec<Worker>>,
    assigner: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    in_flight: InFlight,
}

impl Dispatcher {
    pub fn new(max_workers: usize, queue_capacity: usize) -> Result<Self, PipelineError> {
        if max_workers == 0 {
            return Err(PipelineError::ZeroCapacity("worker count"));
        }
        if queue_capacity == 0 {
            return Err(PipelineError::ZeroCapacity("queue capacity"));
        }
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity);
        let (pool_tx, pool_rx) = mpsc::channel(max_workers);
        Ok(Self {
            max_workers,
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            pool_tx,
            pool_rx: Arc::new(AsyncMutex::new(pool_rx)),
            workers: Mutex::new(Vec::new()),
            assigner: Mutex::new(None),
            shutdown: CancellationToken::new(),
            in_flight: InFlight::default(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::new(config.workers, config.queue_capacity)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_tx.max_capacity()
    }

    /// Requests accepted into the queue and not yet finished.
    pub fn pending(&self) -> usize {
        self.in_flight.count()
    }

    /// Tries to push `request` onto the inbound queue, giving up after
    /// `timeout` or when `ctx` is cancelled.
    pub async fn enqueue(
        &self,
        request: Arc<Request>,
        timeout: Duration,
        ctx: &CancellationToken,
    ) -> Delivery {
        let job = Job {
            request,
            ticket: self.in_flight.ticket(),
        };
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Delivery::Cancelled,
            sent = self.queue_tx.send(job) => match sent {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
            _ = tokio::time::sleep(timeout) => Delivery::TimedOut,
        }
    }

    /// Starts the workers and the assignment loop. Must be called from
    /// within a Tokio runtime, and only once.
    pub fn run(&self, processor: Arc<dyn Processor>) -> Result<(), PipelineError> {
        let queue = self
            .queue_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(PipelineError::AlreadyRunning)?;

        let workers = (0..self.max_workers)
            .map(|id| {
                Worker::start(
                    id,
                    self.pool_tx.clone(),
                    Arc::clone(&processor),
                    self.shutdown.child_token(),
                )
            })
            .collect();
        *self.workers.lock().unwrap_or_else(PoisonError::into_inner) = workers;

        let assigner = tokio::spawn(assign(
            queue,
            Arc::clone(&self.pool_rx),
            self.shutdown.clone(),
        ));
        *self.assigner.lock().unwrap_or_else(PoisonError::into_inner) = Some(assigner);
        debug!(workers = self.max_workers, "dispatcher running");
        Ok(())
    }

    /// Signals the assignment loop and the workers to exit. Does not wait;
    /// requests still queued or waiting for a worker are dropped.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stops, then waits for the assignment loop and every worker to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let assigner = self
            .assigner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(assigner) = assigner {
            if let Err(err) = assigner.await {
                error!(error = %err, "dispatcher loop panicked");
            }
        }
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for worker in workers {
            worker.join().await;
        }
    }

    /// Waits until every accepted request has been processed, dropped as
    /// cancelled, or discarded by a stop.
    ///
    /// Requests queued on a dispatcher that was never run keep this pending.
    pub async fn drain(&self) {
        self.in_flight.wait_idle().await;
    }
}

async fn assign(
    mut queue: mpsc::Receiver<Job>,
    pool: Arc<AsyncMutex<mpsc::Receiver<IdleSlot>>>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = queue.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        // Waiting for a free worker happens off the loop so the queue keeps
        // draining; start order across requests is therefore not guaranteed.
        let pool = Arc::clone(&pool);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let slot = {
                let mut idle = pool.lock().await;
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => None,
                    slot = idle.recv() => slot,
                }
            };
            match slot {
                Some(slot) => slot.assign(job).await,
                None => debug!(
                    request = job.request.id(),
                    "dispatcher stopped before a worker was free"
                ),
            }
        });
    }
    debug!("dispatcher loop stopped");
}
