use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{Job, Processor};

/// An idle worker's receive endpoint, parked in the dispatcher's pool.
#[derive(Debug)]
pub(crate) struct IdleSlot {
    worker: usize,
    tx: mpsc::Sender<Job>,
}

impl IdleSlot {
    /// Hands `job` to the worker that registered this slot.
    pub(crate) async fn assign(self, job: Job) {
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job).await {
            debug!(
                worker = self.worker,
                request = job.request.id(),
                "worker stopped before taking the request"
            );
        }
    }
}

/// One execution slot.
///
/// The worker offers itself to the pool, takes one request, and only
/// offers itself again once that request has been fully handled.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn start(
        id: usize,
        pool: mpsc::Sender<IdleSlot>,
        processor: Arc<dyn Processor>,
        stop: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(register_loop(id, pool, processor, stop.clone()));
        Self { id, stop, handle }
    }

    /// Signals the worker to stop taking requests. Does not wait.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Waits for the worker loop to exit, including any request it is
    /// currently handling.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            error!(worker = self.id, error = %err, "worker loop panicked");
        }
    }
}

async fn register_loop(
    id: usize,
    pool: mpsc::Sender<IdleSlot>,
    processor: Arc<dyn Processor>,
    stop: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel::<Job>(1);
    loop {
        let slot = IdleSlot {
            worker: id,
            tx: tx.clone(),
        };
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            registered = pool.send(slot) => {
                if registered.is_err() {
                    break;
                }
            }
        }

        let job = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            job = rx.recv() => job,
        };
        let Some(job) = job else { break };

        // A panicking handler takes down its own task, not this loop.
        let task = tokio::spawn(handle(id, job, Arc::clone(&processor)));
        if let Err(err) = task.await {
            error!(worker = id, error = %err, "request handler panicked");
        }
    }
    debug!(worker = id, "worker stopped");
}

async fn handle(worker: usize, job: Job, processor: Arc<dyn Processor>) {
    let Job {
        request,
        ticket: _ticket,
    } = job;
    if request.is_cancelled() {
        debug!(worker, request = request.id(), "request cancelled, dropping");
        return;
    }
    debug!(worker, request = request.id(), "processing request");
    if let Err(err) = processor.process(&request).await {
        debug!(worker, request = request.id(), error = %err, "request failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::in_flight::InFlight;
    use crate::pipeline::Request;
    use crate::ProcessError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Processor for Counting {
        async fn process(&self, _request: &Request) -> Result<(), ProcessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn job(in_flight: &InFlight, cancel: CancellationToken) -> Job {
        Job {
            request: Arc::new(Request::new(1, cancel)),
            ticket: in_flight.ticket(),
        }
    }

    #[tokio::test]
    async fn worker_registers_and_processes() {
        let (pool_tx, mut pool_rx) = mpsc::channel(1);
        let processor = Arc::new(Counting::default());
        let in_flight = InFlight::default();
        let worker = Worker::start(0, pool_tx, processor.clone(), CancellationToken::new());

        let slot = pool_rx.recv().await.unwrap();
        slot.assign(job(&in_flight, CancellationToken::new())).await;

        // The slot comes back once the request is done.
        let again = tokio::time::timeout(Duration::from_secs(1), pool_rx.recv())
            .await
            .unwrap();
        assert!(again.is_some());
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.count(), 0);

        worker.stop();
        worker.join().await;
    }

    #[tokio::test]
    async fn cancelled_request_is_not_processed() {
        let (pool_tx, mut pool_rx) = mpsc::channel(1);
        let processor = Arc::new(Counting::default());
        let in_flight = InFlight::default();
        let worker = Worker::start(0, pool_tx, processor.clone(), CancellationToken::new());

        let cancel = CancellationToken::new();
        cancel.cancel();
        pool_rx
            .recv()
            .await
            .unwrap()
            .assign(job(&in_flight, cancel))
            .await;
        pool_rx.recv().await.unwrap();

        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(in_flight.count(), 0);
        worker.stop();
        worker.join().await;
    }

    #[tokio::test]
    async fn stopped_worker_exits_while_idle() {
        let (pool_tx, _pool_rx) = mpsc::channel(1);
        let worker = Worker::start(3, pool_tx, Arc::new(Counting::default()), CancellationToken::new());

        worker.stop();
        tokio::time::timeout(Duration::from_secs(1), worker.join())
            .await
            .unwrap();
    }
}
