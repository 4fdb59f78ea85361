//! Documents, field paths and the write operations applied to them

use crate::error::{Result, StoreError};
use serde_json::{Map, Value};
use std::fmt;

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Path to a (possibly nested) field inside a document.
///
/// Stored as explicit segments so that keys containing `.` (record ids,
/// for instance) are never split.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from explicit segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path such as `items.abc`.
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.'))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    fn validate(&self) -> Result<()> {
        if self.0.is_empty() || self.0.iter().any(|s| s.is_empty()) {
            return Err(StoreError::invalid_path(format!(
                "field path '{}' has an empty segment",
                self
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// One partial write applied by `update_fields`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    /// Replace (or create) the value at the path
    Set(FieldPath, Value),
    /// Remove the value at the path; missing paths are ignored
    Delete(FieldPath),
}

impl FieldWrite {
    pub fn set(path: FieldPath, value: Value) -> Self {
        FieldWrite::Set(path, value)
    }

    pub fn delete(path: FieldPath) -> Self {
        FieldWrite::Delete(path)
    }

    pub fn path(&self) -> &FieldPath {
        match self {
            FieldWrite::Set(path, _) | FieldWrite::Delete(path) => path,
        }
    }
}

/// Apply field writes to a document in order.
///
/// Intermediate segments that are missing (or not objects) are replaced by
/// empty objects on `Set`.
pub fn apply_field_writes(doc: &mut Document, writes: &[FieldWrite]) -> Result<()> {
    for write in writes {
        write.path().validate()?;
        match write {
            FieldWrite::Set(path, value) => {
                let (last, parents) = split_last(path)?;
                let mut cursor = &mut *doc;
                for segment in parents {
                    let entry = cursor
                        .entry(segment.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !entry.is_object() {
                        *entry = Value::Object(Map::new());
                    }
                    cursor = entry
                        .as_object_mut()
                        .ok_or_else(|| StoreError::invalid_path(path.to_string()))?;
                }
                cursor.insert(last.clone(), value.clone());
            }
            FieldWrite::Delete(path) => {
                let (last, parents) = split_last(path)?;
                remove_nested(doc, parents, last);
            }
        }
    }
    Ok(())
}

fn remove_nested(map: &mut Document, parents: &[String], last: &str) {
    match parents.split_first() {
        None => {
            map.remove(last);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = map.get_mut(head) {
                remove_nested(child, rest, last);
            }
        }
    }
}

fn split_last(path: &FieldPath) -> Result<(&String, &[String])> {
    path.0
        .split_last()
        .ok_or_else(|| StoreError::invalid_path("empty field path"))
}

/// Serialized size of a document in bytes (compact JSON).
pub fn document_size(doc: &Document) -> Result<usize> {
    Ok(serde_json::to_vec(doc)?.len())
}

/// Check that a collection name or document id is a single, safe segment.
///
/// Ids end up as file names in the file backend, so separators and
/// relative components are refused everywhere.
pub fn validate_key(kind: &str, key: &str) -> Result<()> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0'])
    {
        return Err(StoreError::invalid_path(format!("invalid {kind} '{key}'")));
    }
    Ok(())
}
