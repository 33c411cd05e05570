//! Encoding and decoding of the reservation document.
//!
//! The persisted form is always a JSON array. Decoding is strict internally
//! (`decode_document` reports why it failed) and permissive at the boundary
//! (`decode_or_empty` turns every failure into an empty list).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::StorageError;

/// Why a document could not be decoded.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("document is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("document is a JSON {0}, expected an array")]
    NotAnArray(&'static str),

    #[error("document contains an invalid record: {0}")]
    Record(#[source] serde_json::Error),
}

/// Decode a document into its records.
pub fn decode_document<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, DecodeError> {
    let value: Value = serde_json::from_slice(bytes).map_err(DecodeError::Malformed)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(DecodeError::Record))
            .collect(),
        other => Err(DecodeError::NotAnArray(json_kind(&other))),
    }
}

/// Decode a document, degrading to an empty list on any failure.
pub fn decode_or_empty<T: DeserializeOwned>(bytes: &[u8]) -> Vec<T> {
    decode_document(bytes).unwrap_or_default()
}

/// Coerce an arbitrary JSON value into document shape.
///
/// Arrays pass through untouched; anything else (including `null`) becomes `[]`.
pub fn coerce_document(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

/// Encode records as a JSON array.
pub fn encode_document<T: Serialize>(items: &[T]) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(items).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
