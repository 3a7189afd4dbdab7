//! A concurrent, in-process MapReduce (lite) pipeline.
//!
//! Batches of input are wrapped into binary wire messages, fanned out by a
//! [`pipeline::Producer`] to one or more [`pipeline::Dispatcher`]s, and
//! handed to a pool of workers that run a pluggable map/reduce
//! [`Workload`] over each message. Per-batch results are kept in memory
//! and folded into one [`Record`] per key once every batch has drained.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod records;
pub mod standalone;
pub mod utils;
pub mod workload;

pub use codec::Payload;
pub use error::{CodecError, PipelineError, ProcessError};

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes the decoded payload of one batch.
///
/// It returns an iterator that yields new key-value pairs, in order.
pub type MapFn = fn(payload: &Payload) -> MapOutput;

/// A reduce function takes in a key and an iterator over every value
/// grouped under that key. It returns an [`anyhow::Result`]
/// containing a single output value.
///
/// The same signature serves both the per-batch reduce and the final
/// reduce that runs across all stored batch results.
pub type ReduceFn =
    fn(key: &str, values: Box<dyn Iterator<Item = Bytes> + '_>) -> anyhow::Result<Bytes>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
    pub final_reduce_fn: ReduceFn,
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: String,
    /// The value.
    pub value: Bytes,
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<String>, value: Bytes) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Get the key of this key-value pair.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Consumes the key-value pair and returns the key.
    #[inline]
    pub fn into_key(self) -> String {
        self.key
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }

    /// Splits the pair into its parts.
    #[inline]
    pub fn into_parts(self) -> (String, Bytes) {
        (self.key, self.value)
    }
}

/////////////////////////////////////////////////////////////////////////////
// Final records
/////////////////////////////////////////////////////////////////////////////

/// The final aggregate kept for every key.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl Record {
    /// Size of the binary form: three little-endian `f64`s.
    pub const ENCODED_LEN: usize = 24;

    pub fn new(min: f64, max: f64, avg: f64) -> Self {
        Self { min, max, avg }
    }

    /// Encodes the record as `min | max | avg`.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_LEN);
        buf.put_f64_le(self.min);
        buf.put_f64_le(self.max);
        buf.put_f64_le(self.avg);
        buf.freeze()
    }

    /// Decodes a value produced by [`Record::to_bytes`].
    ///
    /// Anything other than exactly [`Record::ENCODED_LEN`] bytes is rejected.
    pub fn from_bytes(mut buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() != Self::ENCODED_LEN {
            return Err(CodecError::RecordLength {
                expected: Self::ENCODED_LEN,
                actual: buf.len(),
            });
        }
        Ok(Self {
            min: buf.get_f64_le(),
            max: buf.get_f64_le(),
            avg: buf.get_f64_le(),
        })
    }
}
