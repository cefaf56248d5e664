//! Shared data model types.
//!
//! Values are plain JSON values as delivered by the scoreboard:
//! - `Value::Null` is the explicit "cleared" marker
//! - a key missing from the mirror has never been observed
//!
//! Records are flat field maps assembled from many key/value notifications.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A write or subscription request handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Ask the authority to start sending changes for these patterns.
    Register(Vec<String>),

    /// Ask the authority to adopt `value` for `key` (`Null` clears it).
    Set { key: String, value: Value },
}

/// A structured record (e.g. a skater) held by a reactive collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a field as a string, if it holds one.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Whether the field is present (a `Null` value counts as present).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Whether the field holds a non-null, non-empty value.
    pub fn has_value(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(is_truthy)
    }

    /// Set a single field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    /// Shallow merge: every field in `other` overwrites the same field here.
    pub fn merge(&mut self, other: &Record) {
        for (field, value) in &other.fields {
            self.fields.insert(field.clone(), value.clone());
        }
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
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

/// Equality predicate over named record fields.
///
/// A record satisfies the matcher only if it carries every listed field with
/// an equal value. Missing fields never match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matcher {
    fields: Vec<(String, Value)>,
}

impl Matcher {
    /// Matcher on a single field.
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(name, value)
    }

    /// Add another required field.
    pub fn and(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.fields
            .iter()
            .all(|(name, value)| record.get(name) == Some(value))
    }

    /// The value required for `name`, if the matcher constrains it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// The matcher's fields as a record (used when creating a new record).
    pub fn to_record(&self) -> Record {
        self.fields.iter().cloned().collect()
    }
}

/// Truthiness as the panel uses it: null, `""`, `false` and zero count as unset.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a value the way a display binding shows it (`Null` -> `None`).
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
