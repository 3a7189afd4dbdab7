use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::field::{ByteField, FieldList, FieldValue};
use crate::CodecError;

pub const VERSION: &str = "Version";
pub const CLIENT_ID: &str = "ClientId";
pub const IDENTIFIER_LENGTH: &str = "IdentifierLength";
pub const IDENTIFIER: &str = "Identifier";
pub const DATA_LENGTH: &str = "DataLength";
pub const DATA: &str = "Data";

/// The structured unit submitted for processing.
///
/// On the wire it is laid out as
/// `Version(u16) | ClientId(u16) | IdentifierLength(u32) | Identifier | DataLength(u32) | Data`.
/// The JSON form (`{"version", "clientId", "identifier", "data"}`, byte
/// fields base64) is only a debugging and interchange view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub version: u16,
    pub client_id: u16,
    #[serde(with = "base64_bytes")]
    pub identifier: Bytes,
    #[serde(with = "base64_bytes")]
    pub data: Bytes,
}

impl Payload {
    pub fn new(
        version: u16,
        client_id: u16,
        identifier: impl Into<Bytes>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            version,
            client_id,
            identifier: identifier.into(),
            data: data.into(),
        }
    }

    /// The payload schema with zero values, suitable for decoding raw input.
    pub fn schema() -> FieldList {
        Payload::default()
            .to_fields()
            .unwrap_or_default()
    }

    /// Projects the payload onto its wire schema.
    pub fn to_fields(&self) -> Result<FieldList, CodecError> {
        Ok([
            ByteField::u16(VERSION, self.version),
            ByteField::u16(CLIENT_ID, self.client_id),
            ByteField::u32(IDENTIFIER_LENGTH, wire_len(IDENTIFIER, &self.identifier)?),
            ByteField::bytes(IDENTIFIER, self.identifier.clone()),
            ByteField::u32(DATA_LENGTH, wire_len(DATA, &self.data)?),
            ByteField::bytes(DATA, self.data.clone()),
        ]
        .into_iter()
        .collect())
    }

    /// Rebuilds a payload from decoded fields. Length fields and
    /// unknown names are skipped.
    pub fn from_fields(fields: &FieldList) -> Self {
        let mut payload = Payload::default();
        for field in fields {
            match (field.name, &field.value) {
                (VERSION, FieldValue::U16(v)) => payload.version = *v,
                (CLIENT_ID, FieldValue::U16(v)) => payload.client_id = *v,
                (IDENTIFIER, FieldValue::Bytes(b)) => payload.identifier = b.clone(),
                (DATA, FieldValue::Bytes(b)) => payload.data = b.clone(),
                (IDENTIFIER_LENGTH | DATA_LENGTH, _) => {}
                (name, value) => {
                    tracing::trace!(field = name, kind = ?value.kind(), "ignoring unsupported payload field")
                }
            }
        }
        payload
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn wire_len(field: &str, bytes: &Bytes) -> Result<u32, CodecError> {
    u32::try_from(bytes.len()).map_err(|_| CodecError::FieldTooLarge {
        field: field.to_string(),
        len: bytes.len(),
    })
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_follow_wire_order() {
        let fields = Payload::new(2, 7, "id", "abc").to_fields().unwrap();
        let names: Vec<_> = fields.iter().map(|field| field.name).collect();

        assert_eq!(
            names,
            [VERSION, CLIENT_ID, IDENTIFIER_LENGTH, IDENTIFIER, DATA_LENGTH, DATA]
        );
        assert_eq!(fields.get(IDENTIFIER_LENGTH).unwrap().value, FieldValue::U32(2));
        assert_eq!(fields.get(DATA_LENGTH).unwrap().value, FieldValue::U32(3));
    }

    #[test]
    fn json_projection_uses_base64() {
        let payload = Payload::new(1, 42, "custom token", "Hello, World!");
        let json = payload.to_json().unwrap();

        assert_eq!(
            json,
            r#"{"version":1,"clientId":42,"identifier":"Y3VzdG9tIHRva2Vu","data":"SGVsbG8sIFdvcmxkIQ=="}"#
        );
        assert_eq!(Payload::from_json(&json).unwrap(), payload);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let json = r#"{"version":1,"clientId":1,"identifier":"","data":"not base64!"}"#;
        assert!(Payload::from_json(json).is_err());
    }

    #[test]
    fn from_fields_skips_unknown_entries() {
        let mut fields = Payload::new(5, 6, "a", "b").to_fields().unwrap();
        fields.push(ByteField::u16("Checksum", 0xbeef));

        assert_eq!(Payload::from_fields(&fields), Payload::new(5, 6, "a", "b"));
    }
}
