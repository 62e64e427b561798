//! Diffing two snapshots of the same map.
//!
//! # Algorithm
//!
//! 1. Walk the desired snapshot: names missing from current are adds, names
//!    present in both with loosely different values are changes
//! 2. Walk the current snapshot: names missing from desired are deletes
//!
//! Both snapshots iterate in name order, so every list in the result is
//! sorted and the output does not depend on how the inputs were built.

use crate::{EntryName, EntryValue, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value change for an entry present on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub name: EntryName,
    pub from: EntryValue,
    pub to: EntryValue,
}

/// The change set between a current and a desired snapshot.
///
/// `add`, `del` and the names in `chg` never overlap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Names present only in desired
    pub add: Vec<EntryName>,
    /// Names present only in current
    pub del: Vec<EntryName>,
    /// Names present in both with different values
    pub chg: Vec<Change>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.del.is_empty() && self.chg.is_empty()
    }

    /// Total number of mutations the diff implies.
    pub fn len(&self) -> usize {
        self.add.len() + self.del.len() + self.chg.len()
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no changes");
        }
        for name in &self.add {
            writeln!(f, "+ {}", name)?;
        }
        for change in &self.chg {
            writeln!(f, "~ {}: {} -> {}", change.name, change.from, change.to)?;
        }
        for name in &self.del {
            writeln!(f, "- {}", name)?;
        }
        Ok(())
    }
}

/// Compute the diff that takes `current` to `desired`.
pub fn diff(current: &Snapshot, desired: &Snapshot) -> Diff {
    let mut result = Diff::default();

    for (name, to) in desired.iter() {
        match current.get(name) {
            None => result.add.push(name.clone()),
            Some(from) if !from.loosely_eq(to) => result.chg.push(Change {
                name: name.clone(),
                from: from.clone(),
                to: to.clone(),
            }),
            Some(_) => {}
        }
    }

    result.del = current
        .iter()
        .filter(|(name, _)| !desired.contains(name))
        .map(|(name, _)| name.clone())
        .collect();

    result
}
