use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ChangeEvent, Document};

/// A single equality predicate over one column.
///
/// This is the only filter shape the sync layer understands; anything richer
/// belongs server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Document) -> bool {
        row.get(&self.column) == Some(&self.value)
    }

    /// Whether a change event concerns a row in this filter's result set.
    pub fn matches_event(&self, event: &ChangeEvent<Document>) -> bool {
        event.keyed().is_some_and(|row| self.matches(row))
    }
}
