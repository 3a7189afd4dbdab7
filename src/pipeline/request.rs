use tokio_util::sync::CancellationToken;

use crate::codec::{Payload, Serialisable};
use crate::CodecError;

/// One unit of work travelling through the pipeline.
#[derive(Debug)]
pub struct Request {
    id: u64,
    message: Serialisable,
    cancel: CancellationToken,
}

impl Request {
    /// A request with an empty message.
    pub fn new(id: u64, cancel: CancellationToken) -> Self {
        Self {
            id,
            message: Serialisable::new(),
            cancel,
        }
    }

    /// Installs the payload's fields and encodes them right away, so the
    /// message bytes always reflect the last payload added.
    pub fn add_payload(&mut self, payload: &Payload) -> Result<(), CodecError> {
        let fields = payload.to_fields()?;
        self.message.codec_mut().add_fields(fields);
        self.message.encode();
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn message(&self) -> &Serialisable {
        &self.message
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
