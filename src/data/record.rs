use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Timestamp;

/// Capability trait for anything the sync layer can keep in a collection.
///
/// The layer enforces no schema beyond a unique `id`; payload typing is left
/// to each consumer through serde.
pub trait Record: Clone + Serialize + DeserializeOwned {
    fn id(&self) -> &str;
}

/// Records that carry a creation timestamp, for recency-ordered windows.
pub trait Stamped: Record {
    fn created_at(&self) -> Timestamp;
}

/// An untyped row as delivered by a backend.
///
/// Every backend speaks `Document` on the wire; typed records are decoded
/// from it at the subscription boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Document(Map::new())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    /// Decode into a typed record.
    pub fn decode<R: Record>(&self) -> serde_json::Result<R> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    /// Encode a typed record back into a wire row.
    pub fn from_record<R: Record>(record: &R) -> serde_json::Result<Self> {
        match serde_json::to_value(record)? {
            Value::Object(map) => Ok(Document(map)),
            other => Err(serde::de::Error::custom(format!(
                "record did not serialize to an object: {other}"
            ))),
        }
    }
}

impl Record for Document {
    fn id(&self) -> &str {
        // Rows are validated to carry an `id` before they reach a collection.
        self.0.get("id").and_then(Value::as_str).unwrap_or("")
    }
}
