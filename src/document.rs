use std::ops::Index;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the field that carries a document's identity.
pub const KEY_FIELD: &str = "key";

/// A JSON object stored in a [`DocumentStore`](crate::DocumentStore).
///
/// The `key` field is the document's identifier within its table. It is
/// absent on a document that has never been saved and present on every
/// document handed back by the store. Everything else is opaque JSON.
///
/// # Example
///
/// ```
/// use lawnchair::Document;
/// use serde_json::json;
///
/// let mut doc = Document::from_value(json!({"name": "sprinkler", "zone": 3})).unwrap();
/// assert_eq!(doc.key(), None);
/// assert_eq!(doc["zone"], 3);
///
/// doc.set_key("ABC");
/// assert_eq!(doc.key(), Some("ABC"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document with no key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON value.
    ///
    /// Returns the value back if it is not an object.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(other),
        }
    }

    /// The raw `key` field, whatever JSON type it holds.
    pub fn raw_key(&self) -> Option<&Value> {
        self.fields.get(KEY_FIELD)
    }

    /// The document's key, if it carries a string one.
    pub fn key(&self) -> Option<&str> {
        self.raw_key().and_then(Value::as_str)
    }

    /// Attach a key, replacing any previous one.
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.fields
            .insert(KEY_FIELD.to_string(), Value::String(key.into()));
    }

    /// Detach the key, returning the previous value of the field.
    pub fn take_key(&mut self) -> Option<Value> {
        self.fields.remove(KEY_FIELD)
    }

    /// A copy of the document without its `key` field.
    pub fn without_key(&self) -> Self {
        let mut body = self.clone();
        body.take_key();
        body
    }

    /// Look up a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Mutable access to a field.
    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    /// Set a field, returning its previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns `true` if the field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields, `key` included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the document has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Borrow the underlying JSON map.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the document and return it as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

impl TryFrom<Value> for Document {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Missing fields index to `Value::Null`, like `serde_json::Value` does.
impl Index<&str> for Document {
    type Output = Value;

    fn index(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }
}

/// Anything that names a record: a bare key or a document carrying one.
///
/// Used by [`DocumentStore::remove`](crate::DocumentStore::remove).
pub trait AsKey {
    /// The key this value refers to, if any.
    fn as_key(&self) -> Option<&str>;
}

impl AsKey for str {
    fn as_key(&self) -> Option<&str> {
        Some(self)
    }
}

impl AsKey for String {
    fn as_key(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl AsKey for Document {
    fn as_key(&self) -> Option<&str> {
        self.key()
    }
}

impl<T: AsKey + ?Sized> AsKey for &T {
    fn as_key(&self) -> Option<&str> {
        (**self).as_key()
    }
}
