use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Delivery, Dispatcher, Request};
use crate::PipelineError;

pub const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_secs(60);

/// Finished notifications that may queue up before `start` consumes them.
const DONE_BACKLOG: usize = 100;

pub type SubscriptionId = u64;

/// Per-subscriber outcome of one broadcast, in subscription order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    outcomes: Vec<(SubscriptionId, Delivery)>,
}

impl BroadcastReport {
    pub fn outcomes(&self) -> &[(SubscriptionId, Delivery)] {
        &self.outcomes
    }

    pub fn get(&self, id: SubscriptionId) -> Option<Delivery> {
        self.outcomes
            .iter()
            .find(|(sub, _)| *sub == id)
            .map(|(_, delivery)| *delivery)
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, delivery)| *delivery == Delivery::Delivered)
            .count()
    }

    /// True when every subscriber took the request.
    pub fn is_complete(&self) -> bool {
        self.delivered() == self.outcomes.len()
    }
}

/// Broadcast hub: every request goes to every subscribed dispatcher.
#[derive(Debug)]
pub struct Producer {
    subscribers: RwLock<BTreeMap<SubscriptionId, Arc<Dispatcher>>>,
    next_id: AtomicU64,
    done_tx: mpsc::Sender<SubscriptionId>,
    done_rx: Mutex<Option<mpsc::Receiver<SubscriptionId>>>,
    broadcast_timeout: Duration,
}

impl Default for Producer {
    fn default() -> Self {
        Self::new()
    }
}

impl Producer {
    pub fn new() -> Self {
        Self::with_broadcast_timeout(DEFAULT_BROADCAST_TIMEOUT)
    }

    pub fn with_broadcast_timeout(broadcast_timeout: Duration) -> Self {
        let (done_tx, done_rx) = mpsc::channel(DONE_BACKLOG);
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            done_tx,
            done_rx: Mutex::new(Some(done_rx)),
            broadcast_timeout,
        }
    }

    pub fn broadcast_timeout(&self) -> Duration {
        self.broadcast_timeout
    }

    pub async fn subscribe(&self, dispatcher: Arc<Dispatcher>) -> SubscriptionId {
        let mut subscribers = self.subscribers.write().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        subscribers.insert(id, dispatcher);
        debug!(subscriber = id, "dispatcher subscribed");
        id
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Tells the supervisor that subscriber `id` is done and should be
    /// stopped and removed.
    pub async fn notify_finished(&self, id: SubscriptionId) -> Result<(), PipelineError> {
        self.done_tx
            .send(id)
            .await
            .map_err(|_| PipelineError::SupervisorClosed)
    }

    /// Supervises subscribers until `ctx` is cancelled, then stops accepting
    /// finished notifications.
    pub async fn start(&self, ctx: CancellationToken) -> Result<(), PipelineError> {
        let mut done = self
            .done_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(PipelineError::AlreadyStarted)?;

        loop {
            let id = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                id = done.recv() => match id {
                    Some(id) => id,
                    None => break,
                },
            };
            let removed = self.subscribers.write().await.remove(&id);
            match removed {
                Some(dispatcher) => {
                    dispatcher.stop();
                    info!(subscriber = id, "subscriber finished, removed");
                }
                None => warn!(subscriber = id, "finished notification for unknown subscriber"),
            }
        }

        done.close();
        debug!("producer supervisor stopped");
        Ok(())
    }

    /// Offers `request` to every subscriber concurrently.
    ///
    /// A subscriber whose queue stays full past the broadcast timeout misses
    /// this request; it is not retried.
    pub async fn broadcast(
        &self,
        ctx: &CancellationToken,
        request: Arc<Request>,
    ) -> BroadcastReport {
        let subscribers = self.subscribers.read().await;
        let attempts = subscribers.iter().map(|(&id, dispatcher)| {
            let request = Arc::clone(&request);
            async move {
                let delivery = dispatcher
                    .enqueue(request, self.broadcast_timeout, ctx)
                    .await;
                (id, delivery)
            }
        });
        let outcomes = join_all(attempts).await;

        for (id, delivery) in &outcomes {
            match delivery {
                Delivery::Delivered => {
                    debug!(subscriber = id, request = request.id(), "request delivered")
                }
                Delivery::Cancelled => {
                    debug!(subscriber = id, request = request.id(), "broadcast cancelled")
                }
                Delivery::TimedOut | Delivery::Closed => warn!(
                    subscriber = id,
                    request = request.id(),
                    outcome = ?delivery,
                    "request not delivered"
                ),
            }
        }
        BroadcastReport { outcomes }
    }
}
