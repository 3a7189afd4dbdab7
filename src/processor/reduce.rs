use std::collections::HashMap;

use bytes::Bytes;
use itertools::Itertools;
use tokio::task::JoinSet;

use crate::{KeyValue, ProcessError, ReduceFn};

/// Groups values under their key. Values keep their relative order
/// within a key; the order of keys is unspecified.
pub fn group_by_key(kvs: Vec<KeyValue>) -> HashMap<String, Vec<Bytes>> {
    kvs.into_iter().map(KeyValue::into_parts).into_group_map()
}

type Reduced = (String, anyhow::Result<Bytes>);

fn spawn_reduces(groups: HashMap<String, Vec<Bytes>>, reduce_fn: ReduceFn) -> JoinSet<Reduced> {
    let mut tasks = JoinSet::new();
    for (key, values) in groups {
        tasks.spawn(async move {
            let reduced = reduce_fn(&key, Box::new(values.into_iter()));
            (key, reduced)
        });
    }
    tasks
}

/// Runs `reduce_fn` over every group concurrently, one task per key.
///
/// Results arrive in completion order. The first failing key aborts the
/// whole call and its siblings are discarded; a reduce that has already
/// started is never interrupted.
pub async fn reduce_groups(
    groups: HashMap<String, Vec<Bytes>>,
    reduce_fn: ReduceFn,
) -> Result<Vec<KeyValue>, ProcessError> {
    let mut tasks = spawn_reduces(groups, reduce_fn);

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            (key, Ok(value)) => results.push(KeyValue::new(key, value)),
            (key, Err(source)) => return Err(ProcessError::Reduce { key, source }),
        }
    }
    Ok(results)
}

/// Like [`reduce_groups`], but every group runs to completion. Failing
/// keys are returned next to the successful ones instead of aborting them.
pub async fn reduce_groups_partial(
    groups: HashMap<String, Vec<Bytes>>,
    reduce_fn: ReduceFn,
) -> (Vec<KeyValue>, Vec<ProcessError>) {
    let mut tasks = spawn_reduces(groups, reduce_fn);

    let mut results = Vec::with_capacity(tasks.len());
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, Ok(value))) => results.push(KeyValue::new(key, value)),
            Ok((key, Err(source))) => failures.push(ProcessError::Reduce { key, source }),
            Err(err) => failures.push(ProcessError::Join(err)),
        }
    }
    (results, failures)
}
