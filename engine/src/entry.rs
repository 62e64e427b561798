//! Entry types stored in a key-value map.

use crate::{error::Result, EntryName, Error};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Largest integer an `f64` represents exactly (2^53).
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// The value held by an entry.
///
/// The remote store serializes every value as a string, so two values are
/// considered equal when their normalized string forms match. The original
/// type is kept for display and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl EntryValue {
    /// Convert a JSON value, rejecting objects, arrays and null.
    pub fn try_from_json(name: &str, value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Ok(Self::String(s.clone())),
            serde_json::Value::Number(n) => Ok(Self::Number(n.clone())),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            other => Err(Error::InvalidValue {
                name: name.to_string(),
                got: json_type_name(other).to_string(),
            }),
        }
    }

    /// Normalized string form used for comparison and for writes.
    pub fn normalized(&self) -> Cow<'_, str> {
        match self {
            Self::String(s) => Cow::Borrowed(s),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Number(n) => Cow::Owned(normalize_number(n)),
        }
    }

    /// Loose equality: `10`, `10.0` and `"10"` are all equal.
    pub fn loosely_eq(&self, other: &EntryValue) -> bool {
        self.normalized() == other.normalized()
    }

    /// The string sent to the remote store.
    pub fn to_wire_string(&self) -> String {
        self.normalized().into_owned()
    }
}

fn normalize_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl fmt::Display for EntryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for EntryValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EntryValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for EntryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for EntryValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<i64> for EntryValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for EntryValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<serde_json::Number> for EntryValue {
    fn from(value: serde_json::Number) -> Self {
        Self::Number(value)
    }
}

/// A single named entry in a key-value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry name, unique and case-sensitive within a map
    pub name: EntryName,
    /// Entry value
    pub value: EntryValue,
}

impl Entry {
    /// Create a new entry.
    pub fn new(name: impl Into<EntryName>, value: impl Into<EntryValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Build an entry from a name and an arbitrary JSON value.
    pub fn from_json(name: impl Into<EntryName>, value: &serde_json::Value) -> Result<Self> {
        let name = name.into();
        let value = EntryValue::try_from_json(&name, value)?;
        Ok(Self { name, value })
    }
}
