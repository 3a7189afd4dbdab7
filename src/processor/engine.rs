use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::reduce::{group_by_key, reduce_groups, reduce_groups_partial};
use super::store::BatchStore;
use crate::codec::Payload;
use crate::pipeline::{Processor, Request};
use crate::*;

/// Runs a [`Workload`] over each request and keeps the per-request
/// results until [`MapReduceProcessor::aggregate_final_results`].
pub struct MapReduceProcessor {
    workload: Workload,
    store: Arc<BatchStore>,
}

impl MapReduceProcessor {
    /// A processor with a fresh, empty result store.
    pub fn new(workload: Workload) -> Self {
        Self::with_store(workload, Arc::new(BatchStore::new()))
    }

    pub fn with_store(workload: Workload, store: Arc<BatchStore>) -> Self {
        Self { workload, store }
    }

    pub fn store(&self) -> &Arc<BatchStore> {
        &self.store
    }

    /// Decodes, maps, groups and reduces one request, then stores the
    /// reduced pairs under the request id.
    ///
    /// Nothing is stored for the request if any step fails.
    pub async fn process_request(&self, request: &Request) -> Result<(), ProcessError> {
        let fields = request
            .message()
            .decode()
            .map_err(|source| ProcessError::Decode {
                id: request.id(),
                source,
            })?;
        let payload = Payload::from_fields(&fields);

        let results = map_reduce(&payload, self.workload.map_fn, self.workload.reduce_fn).await?;
        debug!(request = request.id(), keys = results.len(), "storing batch results");
        self.store.store(request.id(), results);
        Ok(())
    }

    /// Folds every stored result into one [`Record`] per key.
    ///
    /// The store is drained in the process. A key whose final reduce fails,
    /// or whose value is not a record, is logged and left out; the other
    /// keys are still returned. Callers must make sure no request is still
    /// being processed.
    pub async fn aggregate_final_results(&self, final_reduce: ReduceFn) -> HashMap<String, Record> {
        let all = self.store.drain();
        let groups = group_by_key(all);
        let (reduced, failures) = reduce_groups_partial(groups, final_reduce).await;
        for err in &failures {
            warn!(error = %err, "final reduce failed, key skipped");
        }

        reduced
            .into_iter()
            .filter_map(|KeyValue { key, value }| match Record::from_bytes(&value) {
                Ok(record) => Some((key, record)),
                Err(source) => {
                    let err = ProcessError::Record { key, source };
                    warn!(error = %err, "final value skipped");
                    None
                }
            })
            .collect()
    }
}

/// Map a payload and reduce each key group concurrently.
pub async fn map_reduce(
    payload: &Payload,
    map_fn: MapFn,
    reduce_fn: ReduceFn,
) -> Result<Vec<KeyValue>, ProcessError> {
    let kvs = map_fn(payload)
        .and_then(|iter| iter.collect::<anyhow::Result<Vec<_>>>())
        .map_err(ProcessError::Map)?;
    reduce_groups(group_by_key(kvs), reduce_fn).await
}

#[async_trait]
impl Processor for MapReduceProcessor {
    async fn process(&self, request: &Request) -> Result<(), ProcessError> {
        let result = self.process_request(request).await;
        if let Err(err) = &result {
            warn!(request = request.id(), error = %err, "request dropped");
        }
        result
    }
}
