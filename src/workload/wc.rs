//! A MapReduce-compatible implementation of word count.
//!
//! The per-batch reduce counts every word; the final reduce summarises
//! those per-batch counts, so each [`Record`] reads as "fewest, most and
//! mean occurrences in a batch that contains the word".

use crate::utils::{bytes_to_count, count_to_bytes, string_from_bytes};
use crate::*;
use anyhow::{bail, Result};
use bytes::Bytes;

pub fn map(payload: &Payload) -> MapOutput {
    let s = string_from_bytes(payload.data.clone())?;
    let words = s
        .split(|c: char| !c.is_alphabetic())
        .filter(|s| !s.is_empty())
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>();

    let iter = words
        .into_iter()
        .map(|word| -> Result<KeyValue> { Ok(KeyValue::new(word, count_to_bytes(1))) });
    Ok(Box::new(iter))
}

pub fn reduce(_key: &str, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let mut count = 0u64;
    for value in values {
        count += bytes_to_count(&value)?;
    }
    Ok(count_to_bytes(count))
}

pub fn final_reduce(key: &str, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let counts = values
        .map(|value| bytes_to_count(&value))
        .collect::<Result<Vec<_>>>()?;
    let (Some(min), Some(max)) = (counts.iter().min(), counts.iter().max()) else {
        bail!("word `{key}` has no counts");
    };
    let avg = counts.iter().sum::<u64>() as f64 / counts.len() as f64;
    Ok(Record::new(*min as f64, *max as f64, avg).to_bytes())
}
