//! Binary wire codec.
//!
//! A [`Payload`] is projected onto a [`FieldList`], which a
//! [`Serialisable`] encodes into a single little-endian buffer. Decoding
//! walks the same schema, sizing every byte field from the length field
//! that precedes it.

mod field;
mod message;
mod payload;

pub use field::{ByteField, FieldKind, FieldList, FieldValue, LENGTH_SUFFIX};
pub use message::{decode_fields, encode_fields, MessageCodec, Serialisable};
pub use payload::{Payload, CLIENT_ID, DATA, DATA_LENGTH, IDENTIFIER, IDENTIFIER_LENGTH, VERSION};
