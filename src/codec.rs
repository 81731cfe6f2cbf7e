//! JSON encoding of document bodies.
//!
//! Stored values are parsed with `serde_json` only. Text that is not a JSON
//! object is rejected instead of being coerced into a partial document.

use std::fmt;

use serde_json::Value;

use crate::document::Document;

/// Error produced when stored text cannot be turned back into a document.
#[derive(Debug)]
pub enum CodecError {
    /// The text is not valid JSON.
    Json(serde_json::Error),
    /// The text is valid JSON but not an object.
    NotAnObject,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "invalid JSON: {e}"),
            Self::NotAnObject => write!(f, "stored value is not a JSON object"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::NotAnObject => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Encode a document body as JSON text. The `key` field is never written.
pub fn serialize(doc: &Document) -> Result<String, serde_json::Error> {
    if doc.raw_key().is_some() {
        serde_json::to_string(&doc.without_key())
    } else {
        serde_json::to_string(doc)
    }
}

/// Parse JSON text produced by [`serialize`] back into a document.
pub fn deserialize(text: &str) -> Result<Document, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    Document::from_value(value).map_err(|_| CodecError::NotAnObject)
}
