//! Producer → dispatcher → worker routing.
//!
//! A [`Producer`] fans every [`Request`] out to its subscribed
//! [`Dispatcher`]s. Each dispatcher queues requests and hands them to idle
//! [`Worker`]s, which skip cancelled requests and pass the rest to a
//! [`Processor`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::ProcessError;

mod dispatcher;
mod in_flight;
mod producer;
mod request;
mod worker;

pub use dispatcher::{Delivery, Dispatcher};
pub use producer::{BroadcastReport, Producer, SubscriptionId, DEFAULT_BROADCAST_TIMEOUT};
pub use request::Request;
pub use worker::Worker;

/// The work a worker performs on each request it receives.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, request: &Request) -> Result<(), ProcessError>;
}

/// A request on its way through a dispatcher, holding its in-flight ticket.
#[derive(Debug)]
pub(crate) struct Job {
    pub(crate) request: Arc<Request>,
    pub(crate) ticket: in_flight::Ticket,
}
