//! Reconciliation planning and result accounting.
//!
//! The engine never talks to the remote store. It turns a [`Diff`] into a
//! [`ChangeSet`] of concrete writes, and provides the [`ReconcileResult`]
//! accumulator the IO layer fills in while executing them.
//!
//! # Phases
//!
//! A change set is executed in three phases: creates, then updates, then
//! deletes. Entries within a phase are independent of each other.

use crate::{diff::Change, Diff, Entry, EntryName, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a single remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Concrete writes needed to converge a map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Entries to create, with their desired values
    pub creates: Vec<Entry>,
    /// Entries whose value changes
    pub updates: Vec<Change>,
    /// Entry names to delete
    pub deletes: Vec<EntryName>,
}

impl ChangeSet {
    /// Plan the writes for `diff`, taking new values from `desired`.
    ///
    /// An added name missing from `desired` is skipped; that only happens
    /// when the diff was computed against a different snapshot.
    pub fn plan(diff: &Diff, desired: &Snapshot) -> Self {
        let creates = diff
            .add
            .iter()
            .filter_map(|name| {
                desired.get(name).map(|value| Entry {
                    name: name.clone(),
                    value: value.clone(),
                })
            })
            .collect();

        Self {
            creates,
            updates: diff.chg.clone(),
            deletes: diff.del.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// Apply the change set to an in-memory snapshot, in phase order.
    pub fn apply_to(&self, snapshot: &mut Snapshot) {
        for entry in &self.creates {
            snapshot.insert(entry.clone());
        }
        for change in &self.updates {
            snapshot.insert(Entry {
                name: change.name.clone(),
                value: change.to.clone(),
            });
        }
        for name in &self.deletes {
            snapshot.remove(name);
        }
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no changes");
        }
        for entry in &self.creates {
            writeln!(f, "+ {} = {}", entry.name, entry.value)?;
        }
        for change in &self.updates {
            writeln!(f, "~ {}: {} -> {}", change.name, change.from, change.to)?;
        }
        for name in &self.deletes {
            writeln!(f, "- {}", name)?;
        }
        Ok(())
    }
}

/// A single failed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryError {
    pub name: EntryName,
    pub operation: MutationKind,
    pub message: String,
}

/// Outcome of one reconciliation attempt.
///
/// Counts only include writes that succeeded. Failed writes are listed in
/// `errors`; a result with errors means the map did not fully converge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<EntryError>,
    /// Counts describe planned writes, nothing was sent
    pub dry_run: bool,
    /// False when the current state was read from a truncated listing
    pub snapshot_complete: bool,
}

impl Default for ReconcileResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcileResult {
    pub fn new() -> Self {
        Self {
            created: 0,
            updated: 0,
            deleted: 0,
            errors: Vec::new(),
            dry_run: false,
            snapshot_complete: true,
        }
    }

    /// Result for a dry run: planned counts, no errors.
    pub fn preview(diff: &Diff) -> Self {
        Self {
            created: diff.add.len(),
            updated: diff.chg.len(),
            deleted: diff.del.len(),
            dry_run: true,
            ..Self::new()
        }
    }

    pub fn record_success(&mut self, kind: MutationKind) {
        match kind {
            MutationKind::Create => self.created += 1,
            MutationKind::Update => self.updated += 1,
            MutationKind::Delete => self.deleted += 1,
        }
    }

    pub fn record_failure(
        &mut self,
        kind: MutationKind,
        name: impl Into<EntryName>,
        message: impl Into<String>,
    ) {
        self.errors.push(EntryError {
            name: name.into(),
            operation: kind,
            message: message.into(),
        });
    }

    /// Successful (or, for a dry run, planned) writes.
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the remote map now matches the desired state.
    ///
    /// A dry run only counts as converged when it planned no writes.
    pub fn is_converged(&self) -> bool {
        self.errors.is_empty()
            && self.snapshot_complete
            && (!self.dry_run || self.total_changes() == 0)
    }
}

impl fmt::Display for ReconcileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "would have " } else { "" };
        write!(
            f,
            "{}created {}, {}updated {}, {}deleted {}",
            prefix, self.created, prefix, self.updated, prefix, self.deleted
        )?;
        if !self.errors.is_empty() {
            write!(f, ", {} failed", self.errors.len())?;
        }
        if !self.snapshot_complete {
            write!(f, " (current state was truncated)")?;
        }
        Ok(())
    }
}
