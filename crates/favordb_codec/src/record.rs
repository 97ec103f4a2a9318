//! Field-name keyed records.

use crate::error::{CodecError, CodecResult};
use crate::value::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An entity's stored form: field name to [`Value`], ordered by name.
///
/// The typed accessors (`text`, `integer`, ...) fail with
/// [`CodecError::MissingField`] when the field is absent and
/// [`CodecError::WrongKind`] when it holds something else. The `optional_*`
/// variants treat an absent field and `Null` alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Record::insert`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Moves a field to a new name. Returns `false` if `from` is absent.
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.fields.remove(from) {
            Some(value) => {
                self.fields.insert(to.into(), value);
                true
            }
            None => false,
        }
    }

    /// Returns the raw value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns `true` if the field is present (even if `Null`).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Overwrites this record's fields with every field present in `other`.
    ///
    /// Fields only present in `self` are kept.
    pub fn merge(&mut self, other: Record) {
        self.fields.extend(other.fields);
    }

    /// Returns a required field.
    pub fn field(&self, field: &str) -> CodecResult<&Value> {
        self.fields
            .get(field)
            .ok_or_else(|| CodecError::missing_field(field))
    }

    fn optional(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Reads a required text field.
    pub fn text(&self, field: &str) -> CodecResult<&str> {
        let value = self.field(field)?;
        value
            .as_text()
            .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Text, value.kind()))
    }

    /// Reads a required integer field.
    pub fn integer(&self, field: &str) -> CodecResult<i64> {
        let value = self.field(field)?;
        value
            .as_integer()
            .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Integer, value.kind()))
    }

    /// Reads a required non-negative integer field as `u64`.
    pub fn unsigned(&self, field: &str) -> CodecResult<u64> {
        let n = self.integer(field)?;
        u64::try_from(n).map_err(|_| CodecError::IntegerOutOfRange {
            field: field.to_string(),
            value: i128::from(n),
        })
    }

    /// Reads a required boolean field.
    pub fn boolean(&self, field: &str) -> CodecResult<bool> {
        let value = self.field(field)?;
        value
            .as_bool()
            .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Bool, value.kind()))
    }

    /// Reads a required byte-string field.
    pub fn bytes(&self, field: &str) -> CodecResult<&[u8]> {
        let value = self.field(field)?;
        value
            .as_bytes()
            .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Bytes, value.kind()))
    }

    /// Reads a required list field.
    pub fn list(&self, field: &str) -> CodecResult<&[Value]> {
        let value = self.field(field)?;
        value
            .as_list()
            .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::List, value.kind()))
    }

    /// Reads a required embedded record.
    pub fn record(&self, field: &str) -> CodecResult<&Record> {
        let value = self.field(field)?;
        value
            .as_record()
            .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Record, value.kind()))
    }

    /// Reads an optional integer field.
    pub fn optional_integer(&self, field: &str) -> CodecResult<Option<i64>> {
        match self.optional(field) {
            None => Ok(None),
            Some(value) => value
                .as_integer()
                .map(Some)
                .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Integer, value.kind())),
        }
    }

    /// Reads an optional text field.
    pub fn optional_text(&self, field: &str) -> CodecResult<Option<&str>> {
        match self.optional(field) {
            None => Ok(None),
            Some(value) => value
                .as_text()
                .map(Some)
                .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Text, value.kind())),
        }
    }

    /// Reads an optional byte-string field.
    pub fn optional_bytes(&self, field: &str) -> CodecResult<Option<&[u8]>> {
        match self.optional(field) {
            None => Ok(None),
            Some(value) => value
                .as_bytes()
                .map(Some)
                .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Bytes, value.kind())),
        }
    }

    /// Reads an optional embedded record.
    pub fn optional_record(&self, field: &str) -> CodecResult<Option<&Record>> {
        match self.optional(field) {
            None => Ok(None),
            Some(value) => value
                .as_record()
                .map(Some)
                .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::Record, value.kind())),
        }
    }

    /// Reads a list of integers. An absent or null field reads as empty.
    pub fn integers(&self, field: &str) -> CodecResult<Vec<i64>> {
        self.items(field, ValueKind::Integer, Value::as_integer)
    }

    /// Reads a list of text values. An absent or null field reads as empty.
    pub fn texts(&self, field: &str) -> CodecResult<Vec<String>> {
        self.items(field, ValueKind::Text, |v| v.as_text().map(str::to_string))
    }

    /// Reads a list of embedded records. An absent or null field reads as empty.
    pub fn records(&self, field: &str) -> CodecResult<Vec<Record>> {
        self.items(field, ValueKind::Record, |v| v.as_record().cloned())
    }

    fn items<T>(
        &self,
        field: &str,
        kind: ValueKind,
        get: impl Fn(&Value) -> Option<T>,
    ) -> CodecResult<Vec<T>> {
        let Some(value) = self.optional(field) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_list()
            .ok_or_else(|| CodecError::wrong_kind(field, ValueKind::List, value.kind()))?;
        items
            .iter()
            .map(|item| get(item).ok_or_else(|| CodecError::wrong_kind(field, kind, item.kind())))
            .collect()
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<Record> for BTreeMap<String, Value> {
    fn from(record: Record) -> Self {
        record.fields
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
