//! Turning documents into wire payloads.

use serde::Serialize;
use validator::Validate;

use crate::error::SerializationError;

/// Encodes a document of type `D` into the bytes sent to the endpoint.
///
/// Encoding must be deterministic: the same document always yields the
/// same bytes.
pub trait DocumentSerializer<D>: Send + Sync {
    fn serialize(&self, document: &D) -> Result<Vec<u8>, SerializationError>;

    /// Value of the `Content-Type` header for the encoded payload.
    fn content_type(&self) -> &str {
        "application/json"
    }
}

/// JSON encoding of any `Serialize` type.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl<D: Serialize> DocumentSerializer<D> for JsonSerializer {
    fn serialize(&self, document: &D) -> Result<Vec<u8>, SerializationError> {
        Ok(serde_json::to_vec(document)?)
    }
}

/// JSON encoding that refuses documents failing their `validator` rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatingJsonSerializer;

impl<D: Serialize + Validate> DocumentSerializer<D> for ValidatingJsonSerializer {
    fn serialize(&self, document: &D) -> Result<Vec<u8>, SerializationError> {
        document
            .validate()
            .map_err(|e| SerializationError::Invalid(e.to_string()))?;
        JsonSerializer.serialize(document)
    }
}
