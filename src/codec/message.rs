use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::field::{ByteField, FieldKind, FieldList, FieldValue};
use crate::CodecError;

/// Holds the active schema of a [`Serialisable`].
#[derive(Clone, Debug, Default)]
pub struct MessageCodec {
    fields: FieldList,
}

impl MessageCodec {
    /// Replaces the schema (and its values) used for the next encode/decode.
    pub fn add_fields(&mut self, fields: FieldList) {
        self.fields = fields;
    }

    pub fn fields(&self) -> &FieldList {
        &self.fields
    }
}

/// A binary message: one raw buffer plus the codec that describes it.
///
/// The buffer holds at most one message. Inserting data replaces the
/// previous contents, it never appends.
#[derive(Clone, Debug, Default)]
pub struct Serialisable {
    buf: Option<BytesMut>,
    codec: MessageCodec,
}

impl Serialisable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut MessageCodec {
        &mut self.codec
    }

    /// Serialises the codec's fields into the buffer.
    pub fn encode(&mut self) {
        let encoded = encode_fields(self.codec.fields());
        self.insert(&encoded);
    }

    /// Reads the buffer back into a field list shaped like the codec's schema.
    pub fn decode(&self) -> Result<FieldList, CodecError> {
        let buf = self.buf.as_ref().ok_or(CodecError::EmptyBuffer)?;
        decode_fields(self.codec.fields(), buf)
    }

    /// Loads raw bytes, replacing whatever the buffer held.
    pub fn insert(&mut self, data: &[u8]) {
        match self.buf.as_mut() {
            Some(buf) => {
                buf.clear();
                buf.extend_from_slice(data);
            }
            None => self.buf = Some(BytesMut::from(data)),
        }
    }

    /// The current buffer contents; empty if nothing was loaded yet.
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }

    pub fn is_loaded(&self) -> bool {
        self.buf.is_some()
    }
}

/// Writes every field in order: integers little-endian, byte fields raw.
pub fn encode_fields(fields: &FieldList) -> Bytes {
    let size = fields
        .iter()
        .map(|field| match &field.value {
            FieldValue::Bytes(bytes) => bytes.len(),
            value => value.kind().width().unwrap_or_default(),
        })
        .sum();
    let mut buf = BytesMut::with_capacity(size);
    for field in fields {
        match &field.value {
            FieldValue::U16(v) => buf.put_u16_le(*v),
            FieldValue::U32(v) => buf.put_u32_le(*v),
            FieldValue::Bytes(bytes) => buf.put_slice(bytes),
        }
    }
    buf.freeze()
}

/// Decodes `input` following `schema`.
///
/// Byte fields take their size from the `<name>Length` field decoded
/// before them. Bytes left over after the last field are ignored.
pub fn decode_fields(schema: &FieldList, mut input: &[u8]) -> Result<FieldList, CodecError> {
    let mut decoded = FieldList::with_capacity(schema.len());
    for field in schema {
        let needed = match field.kind().width() {
            Some(width) => width,
            None => decoded.length_of(field.name)?,
        };
        if input.remaining() < needed {
            return Err(CodecError::Underrun {
                field: field.name.to_string(),
                needed,
                remaining: input.remaining(),
            });
        }
        let value = match field.kind() {
            FieldKind::U16 => FieldValue::U16(input.get_u16_le()),
            FieldKind::U32 => FieldValue::U32(input.get_u32_le()),
            FieldKind::Bytes => FieldValue::Bytes(input.copy_to_bytes(needed)),
        };
        decoded.push(ByteField::new(field.name, value));
    }
    Ok(decoded)
}
