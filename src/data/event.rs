use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// One committed change on a table, as reported by a change feed.
///
/// Insert carries `new_record` only; Update carries both (the old record is
/// what read-transition detection looks at); Delete carries `old_record`
/// only, whose `id` is the removal key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent<R> {
    pub operation: Operation,
    pub table: String,
    pub new_record: Option<R>,
    pub old_record: Option<R>,
}

impl<R> ChangeEvent<R> {
    pub fn insert(table: impl Into<String>, record: R) -> Self {
        ChangeEvent {
            operation: Operation::Insert,
            table: table.into(),
            new_record: Some(record),
            old_record: None,
        }
    }

    pub fn update(table: impl Into<String>, old: R, new: R) -> Self {
        ChangeEvent {
            operation: Operation::Update,
            table: table.into(),
            new_record: Some(new),
            old_record: Some(old),
        }
    }

    pub fn delete(table: impl Into<String>, old: R) -> Self {
        ChangeEvent {
            operation: Operation::Delete,
            table: table.into(),
            new_record: None,
            old_record: Some(old),
        }
    }

    /// The record whose `id` keys the merge: the new record for inserts and
    /// updates, the old record for deletes.
    pub fn keyed(&self) -> Option<&R> {
        match self.operation {
            Operation::Insert | Operation::Update => self.new_record.as_ref(),
            Operation::Delete => self.old_record.as_ref(),
        }
    }
}
