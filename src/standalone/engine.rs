use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::pipeline::{Dispatcher, Producer, Request, SubscriptionId};
use crate::processor::MapReduceProcessor;
use crate::records::Batch;
use crate::*;

/// Wraps a batch into a request whose cancellation follows `ctx`.
pub fn batch_request(batch: Batch, ctx: &CancellationToken) -> Result<Request, CodecError> {
    let mut request = Request::new(batch.id, ctx.child_token());
    request.add_payload(&batch.into_payload())?;
    Ok(request)
}

/// Runs every batch through producer, dispatchers and workers, waits for
/// the work to drain, then folds the stored results into one record per key.
///
/// All dispatchers share one processor, so a batch seen by several of them
/// is stored once under its id.
pub async fn run_pipeline<I>(
    config: &PipelineConfig,
    workload: Workload,
    batches: I,
) -> Result<HashMap<String, Record>>
where
    I: IntoIterator<Item = Result<Batch>>,
{
    config.validate()?;
    let ctx = CancellationToken::new();
    let producer = Arc::new(Producer::with_broadcast_timeout(config.broadcast_timeout));
    let supervisor = tokio::spawn({
        let producer = Arc::clone(&producer);
        let ctx = ctx.clone();
        async move { producer.start(ctx).await }
    });

    let processor = Arc::new(MapReduceProcessor::new(workload));
    let mut subscribers: Vec<(SubscriptionId, Arc<Dispatcher>)> = Vec::new();
    for _ in 0..config.dispatchers {
        let dispatcher = Arc::new(Dispatcher::from_config(config)?);
        dispatcher.run(processor.clone())?;
        let id = producer.subscribe(Arc::clone(&dispatcher)).await;
        subscribers.push((id, dispatcher));
    }

    let processing = Instant::now();
    let sent = broadcast_all(&producer, &ctx, batches).await;
    for (_, dispatcher) in &subscribers {
        dispatcher.drain().await;
    }
    info!(elapsed = ?processing.elapsed(), "processing finished");

    for (id, dispatcher) in &subscribers {
        producer.notify_finished(*id).await?;
        dispatcher.shutdown().await;
    }
    ctx.cancel();
    supervisor.await.context("producer supervisor panicked")??;

    let sent = sent?;
    let aggregation = Instant::now();
    let results = processor
        .aggregate_final_results(workload.final_reduce_fn)
        .await;
    info!(
        batches = sent,
        keys = results.len(),
        elapsed = ?aggregation.elapsed(),
        "aggregation finished"
    );
    Ok(results)
}

async fn broadcast_all<I>(producer: &Producer, ctx: &CancellationToken, batches: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<Batch>>,
{
    let mut sent = 0;
    for batch in batches {
        let request = Arc::new(batch_request(batch?, ctx)?);
        let report = producer.broadcast(ctx, Arc::clone(&request)).await;
        if !report.is_complete() {
            warn!(
                request = request.id(),
                delivered = report.delivered(),
                subscribers = report.outcomes().len(),
                "batch not delivered everywhere"
            );
        }
        sent += 1;
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Payload;

    #[test]
    fn batch_request_encodes_the_batch() {
        let ctx = CancellationToken::new();
        let request = batch_request(
            Batch {
                id: 4,
                value: "Helsinki;15.0".to_string(),
            },
            &ctx,
        )
        .unwrap();

        assert_eq!(request.id(), 4);
        let payload = Payload::from_fields(&request.message().decode().unwrap());
        assert_eq!(payload, Payload::new(1, 1, "origin", "Helsinki;15.0"));

        ctx.cancel();
        assert!(request.is_cancelled());
    }

    #[tokio::test]
    async fn empty_input_yields_no_records() {
        let results = run_pipeline(
            &PipelineConfig::default(),
            workload::named("weather").unwrap(),
            Vec::new(),
        )
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn source_error_is_reported_after_cleanup() {
        let batches = vec![
            Ok(Batch {
                id: 1,
                value: "Oslo;1.0".to_string(),
            }),
            Err(anyhow::anyhow!("disk went away")),
        ];
        let err = run_pipeline(
            &PipelineConfig::default(),
            workload::named("weather").unwrap(),
            batches,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("disk went away"));
    }
}
