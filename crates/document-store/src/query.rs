use serde_json::Value;

use crate::{DocumentStoreError, Result};

/// A single predicate over a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The value at `path` equals `value` exactly.
    Eq { path: Vec<String>, value: Value },

    /// The value at `path` is an integer greater than or equal to `value`.
    Gte { path: Vec<String>, value: i64 },
}

impl Condition {
    /// Returns true if the document satisfies this condition.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Condition::Eq { path, value } => lookup(doc, path) == Some(value),
            Condition::Gte { path, value } => lookup(doc, path)
                .and_then(Value::as_i64)
                .is_some_and(|actual| actual >= *value),
        }
    }
}

/// Conjunction of field conditions used to select documents.
///
/// Paths are dotted (`"purchaser.email"`) and reach into nested objects.
/// An empty filter matches every document in a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Creates a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the value at `path` to equal `value`.
    pub fn eq(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            path: split_path(path),
            value: value.into(),
        });
        self
    }

    /// Requires the integer at `path` to be at least `value`.
    pub fn gte(mut self, path: &str, value: i64) -> Self {
        self.conditions.push(Condition::Gte {
            path: split_path(path),
            value,
        });
        self
    }

    /// Returns the conditions in the order they were added.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns true if the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns true if the document satisfies every condition.
    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

/// One modification applied by an [`Update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Replace a top-level field.
    Set { field: String, value: Value },

    /// Add `by` to an integer field, treating a missing field as zero.
    Inc { field: String, by: i64 },

    /// Append to an array field, creating it when missing.
    Push { field: String, value: Value },
}

/// An ordered list of field modifications applied atomically to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn inc(mut self, field: &str, by: i64) -> Self {
        self.ops.push(UpdateOp::Inc {
            field: field.to_string(),
            by,
        });
        self
    }

    pub fn push(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Push {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Returns the operations in application order.
    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    /// Returns true if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies the update to a document in place.
    ///
    /// The document is left untouched if any operation fails.
    pub fn apply(&self, doc: &mut Value) -> Result<()> {
        let mut next = doc.clone();
        let object = next.as_object_mut().ok_or_else(|| {
            DocumentStoreError::InvalidUpdate("document is not a JSON object".to_string())
        })?;

        for op in &self.ops {
            match op {
                UpdateOp::Set { field, value } => {
                    object.insert(field.clone(), value.clone());
                }
                UpdateOp::Inc { field, by } => {
                    let current = match object.get(field) {
                        None | Some(Value::Null) => 0,
                        Some(v) => v.as_i64().ok_or_else(|| {
                            DocumentStoreError::InvalidUpdate(format!(
                                "field '{field}' is not an integer"
                            ))
                        })?,
                    };
                    object.insert(field.clone(), Value::from(current + by));
                }
                UpdateOp::Push { field, value } => {
                    let entry = object
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if entry.is_null() {
                        *entry = Value::Array(Vec::new());
                    }
                    entry
                        .as_array_mut()
                        .ok_or_else(|| {
                            DocumentStoreError::InvalidUpdate(format!(
                                "field '{field}' is not an array"
                            ))
                        })?
                        .push(value.clone());
                }
            }
        }

        *doc = next;
        Ok(())
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

fn lookup<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, key| current.get(key))
}
