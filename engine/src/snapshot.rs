//! Snapshots of a key-value map.
//!
//! A snapshot is the complete, deduplicated view of a map at one point in
//! time. Entries are kept in a BTreeMap so iteration and serialization are
//! always sorted by name.

use crate::{error::Result, Entry, EntryName, EntryValue, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A point-in-time view of a key-value map.
///
/// Two ways to build one:
/// - [`Snapshot::from_remote`] for data read from the remote store, where a
///   repeated name is resolved by keeping the later entry.
/// - [`Snapshot::from_desired`] for locally authored state, where a
///   repeated or empty name is a validation error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "SnapshotRepr", try_from = "SnapshotRepr")]
pub struct Snapshot {
    entries: BTreeMap<EntryName, EntryValue>,
    /// Continuation cursor left over when reading stopped early
    cursor: Option<String>,
}

/// Serialized form: a sorted entry list plus the residual cursor, if any.
#[derive(Serialize, Deserialize)]
struct SnapshotRepr {
    entries: Vec<Entry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cursor: Option<String>,
}

impl From<Snapshot> for SnapshotRepr {
    fn from(snapshot: Snapshot) -> Self {
        let Snapshot { entries, cursor } = snapshot;
        Self {
            entries: entries
                .into_iter()
                .map(|(name, value)| Entry { name, value })
                .collect(),
            cursor,
        }
    }
}

impl TryFrom<SnapshotRepr> for Snapshot {
    type Error = Error;

    fn try_from(repr: SnapshotRepr) -> Result<Self> {
        let mut snapshot = Snapshot::from_desired(repr.entries)?;
        snapshot.cursor = repr.cursor.filter(|c| !c.is_empty());
        Ok(snapshot)
    }
}

impl Snapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from entries read off the remote store.
    ///
    /// Later entries overwrite earlier ones with the same name.
    pub fn from_remote(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut snapshot = Self::new();
        for entry in entries {
            snapshot.insert(entry);
        }
        snapshot
    }

    /// Build a snapshot from locally authored desired state.
    pub fn from_desired(entries: impl IntoIterator<Item = Entry>) -> Result<Self> {
        let mut snapshot = Self::new();
        for entry in entries {
            validate_name(&entry.name)?;
            if snapshot.entries.contains_key(&entry.name) {
                return Err(Error::DuplicateName(entry.name));
            }
            snapshot.entries.insert(entry.name, entry.value);
        }
        Ok(snapshot)
    }

    /// Check that every name is usable as desired state.
    ///
    /// Snapshots built with [`Snapshot::from_remote`] or [`Snapshot::insert`]
    /// skip name validation; run this before treating one as desired state.
    pub fn validate(&self) -> Result<()> {
        self.entries.keys().try_for_each(|name| validate_name(name))
    }

    /// Insert or replace an entry. Returns the previous value, if any.
    pub fn insert(&mut self, entry: Entry) -> Option<EntryValue> {
        self.entries.insert(entry.name, entry.value)
    }

    /// Remove an entry by name.
    pub fn remove(&mut self, name: &str) -> Option<EntryValue> {
        self.entries.remove(name)
    }

    /// Get an entry value by name.
    pub fn get(&self, name: &str) -> Option<&EntryValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntryName, &EntryValue)> {
        self.entries.iter()
    }

    /// Entries as an owned, name-sorted list.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
            .into_iter()
            .map(|(name, value)| Entry { name, value })
            .collect()
    }

    /// Residual cursor when the snapshot was cut short.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Record a residual cursor. An empty cursor marks the snapshot complete.
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        let cursor = cursor.into();
        self.cursor = if cursor.is_empty() { None } else { Some(cursor) };
        self
    }

    /// Whether every page was read.
    pub fn is_complete(&self) -> bool {
        self.cursor.is_none()
    }

    /// Entry-wise comparison using loose value equality. Cursors are ignored.
    pub fn loosely_eq(&self, other: &Snapshot) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((an, av), (bn, bv))| an == bn && av.loosely_eq(bv))
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Parse locally authored desired state.
    ///
    /// Accepted shapes:
    /// - `[{"name": "a", "value": 1}, ...]`
    /// - `{"entries": [{"name": "a", "value": 1}, ...]}`
    /// - `{"a": 1, "b": "two"}`
    ///
    /// `entries` is reserved at the top level: an object holding only
    /// `entries` (and optionally `cursor`) is read as the wrapped list.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        match value {
            serde_json::Value::Array(items) => Self::from_desired(parse_entry_list(&items)?),
            serde_json::Value::Object(map) => match map.get("entries") {
                Some(serde_json::Value::Array(items))
                    if map.keys().all(|k| k == "entries" || k == "cursor") =>
                {
                    let snapshot = Self::from_desired(parse_entry_list(items)?)?;
                    match map.get("cursor").and_then(|c| c.as_str()) {
                        Some(cursor) => Ok(snapshot.with_cursor(cursor)),
                        None => Ok(snapshot),
                    }
                }
                _ => {
                    let mut entries = Vec::with_capacity(map.len());
                    for (name, value) in &map {
                        entries.push(Entry::from_json(name.as_str(), value)?);
                    }
                    Self::from_desired(entries)
                }
            },
            other => Err(Error::InvalidSnapshot(format!(
                "expected an array or object, got {}",
                other
            ))),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::EmptyName);
    }
    Ok(())
}

fn parse_entry_list(items: &[serde_json::Value]) -> Result<Vec<Entry>> {
    items
        .iter()
        .map(|item| {
            let name = item
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or(Error::EmptyName)?;
            let value = item.get("value").unwrap_or(&serde_json::Value::Null);
            Entry::from_json(name, value)
        })
        .collect()
}

impl FromIterator<Entry> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self::from_remote(iter)
    }
}
