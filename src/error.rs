//! Error types shared across the codec, the pipeline and the engine.

use thiserror::Error;

/// Failures while building, encoding or decoding a wire message.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The buffer ended before `field` could be read in full.
    #[error("malformed message: field `{field}` needs {needed} bytes, {remaining} remain")]
    Underrun {
        field: String,
        needed: usize,
        remaining: usize,
    },

    /// A variable-length field has no earlier `<field>Length` entry.
    #[error("malformed message: no length field `{field}Length` precedes `{field}`")]
    MissingLength { field: String },

    /// A variable-length field is too large for its 4-byte length prefix.
    #[error("malformed message: field `{field}` is {len} bytes, longer than a u32 length allows")]
    FieldTooLarge { field: String, len: usize },

    /// Decode was called before any bytes were loaded into the message.
    #[error("message buffer is empty, insert or encode data before decoding")]
    EmptyBuffer,

    /// A final reduce value did not have the size of an encoded record.
    #[error("encoded record must be {expected} bytes, got {actual}")]
    RecordLength { expected: usize, actual: usize },
}

/// Failures while running one request through the map-reduce engine.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("could not decode request {id}: {source}")]
    Decode {
        id: u64,
        #[source]
        source: CodecError,
    },

    #[error("map failed: {0:#}")]
    Map(anyhow::Error),

    #[error("reduce failed for key `{key}`: {source:#}")]
    Reduce {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("reduced value for key `{key}` is not a record: {source}")]
    Record {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("reduce task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Misuse of the producer/dispatcher machinery.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("dispatcher is already running")]
    AlreadyRunning,

    #[error("producer supervisor has already been started")]
    AlreadyStarted,

    #[error("producer supervisor is no longer accepting notifications")]
    SupervisorClosed,
}
