//! Wire schema entries.
//!
//! A message type is described by a [`FieldList`]: the fields in the exact
//! order they appear on the wire. Each field's kind is fixed when the
//! schema is built, so encoding and decoding never inspect types at
//! runtime.

use bytes::Bytes;

use crate::CodecError;

/// Suffix naming the 4-byte length field that precedes a [`FieldKind::Bytes`] field.
pub const LENGTH_SUFFIX: &str = "Length";

/// The wire shape of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Little-endian `u16`.
    U16,
    /// Little-endian `u32`.
    U32,
    /// Raw bytes, sized by an earlier `<name>Length` field.
    Bytes,
}

impl FieldKind {
    /// Width on the wire, or `None` for variable-length fields.
    pub fn width(self) -> Option<usize> {
        match self {
            FieldKind::U16 => Some(2),
            FieldKind::U32 => Some(4),
            FieldKind::Bytes => None,
        }
    }
}

/// The value held by a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    U16(u16),
    U32(u32),
    Bytes(Bytes),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::U16(_) => FieldKind::U16,
            FieldValue::U32(_) => FieldKind::U32,
            FieldValue::Bytes(_) => FieldKind::Bytes,
        }
    }

    /// The zero value of a kind, used for decode templates.
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::U16 => FieldValue::U16(0),
            FieldKind::U32 => FieldValue::U32(0),
            FieldKind::Bytes => FieldValue::Bytes(Bytes::new()),
        }
    }

    /// Numeric view of an integer field, as used for length lookups.
    pub fn as_len(&self) -> Option<usize> {
        match self {
            FieldValue::U16(v) => Some(usize::from(*v)),
            FieldValue::U32(v) => usize::try_from(*v).ok(),
            FieldValue::Bytes(_) => None,
        }
    }
}

/// One named entry of a message schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteField {
    pub name: &'static str,
    pub value: FieldValue,
}

impl ByteField {
    pub fn new(name: &'static str, value: FieldValue) -> Self {
        Self { name, value }
    }

    pub fn u16(name: &'static str, value: u16) -> Self {
        Self::new(name, FieldValue::U16(value))
    }

    pub fn u32(name: &'static str, value: u32) -> Self {
        Self::new(name, FieldValue::U32(value))
    }

    pub fn bytes(name: &'static str, value: Bytes) -> Self {
        Self::new(name, FieldValue::Bytes(value))
    }

    #[inline]
    pub fn kind(&self) -> FieldKind {
        self.value.kind()
    }
}

/// An ordered message schema. Order is wire order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldList(Vec<ByteField>);

impl FieldList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, field: ByteField) {
        self.0.push(field);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ByteField> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Finds the first field called `name`.
    pub fn get(&self, name: &str) -> Option<&ByteField> {
        self.0.iter().find(|field| field.name == name)
    }

    /// Resolves the size of the variable-length field `name` from its
    /// `<name>Length` companion among the fields present so far.
    pub fn length_of(&self, name: &str) -> Result<usize, CodecError> {
        self.0
            .iter()
            .find(|field| {
                field
                    .name
                    .strip_suffix(LENGTH_SUFFIX)
                    .is_some_and(|base| base == name)
            })
            .and_then(|field| field.value.as_len())
            .ok_or_else(|| CodecError::MissingLength {
                field: name.to_string(),
            })
    }

    /// A copy of this schema with every value reset to zero.
    pub fn template(&self) -> FieldList {
        self.0
            .iter()
            .map(|field| ByteField::new(field.name, FieldValue::zero(field.kind())))
            .collect()
    }
}

impl FromIterator<ByteField> for FieldList {
    fn from_iter<I: IntoIterator<Item = ByteField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FieldList {
    type Item = ByteField;
    type IntoIter = std::vec::IntoIter<ByteField>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a ByteField;
    type IntoIter = std::slice::Iter<'a, ByteField>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
