//! # kvsync Engine
//!
//! Deterministic diffing and reconciliation planning for remote key-value maps.
//!
//! This crate holds the pure half of kvsync. It compares the current state of
//! a map with a locally authored desired state and plans the writes needed to
//! converge them. The same inputs always produce the same outputs.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine knows nothing about HTTP, credentials or runtimes
//! - **Deterministic**: snapshots are name-ordered, diffs are sorted
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Entries
//!
//! An [`Entry`] is a name and a scalar [`EntryValue`] (string, number or
//! boolean). Values compare loosely: `10`, `10.0` and `"10"` are equal,
//! because the remote store keeps every value as a string.
//!
//! ### Snapshots
//!
//! A [`Snapshot`] is a deduplicated, sorted view of a whole map. Snapshots
//! read from the remote keep the last entry on a repeated name; desired
//! snapshots reject repeated or empty names.
//!
//! ### Diffs and change sets
//!
//! [`diff`] compares two snapshots into a [`Diff`] of added, removed and
//! changed names. [`ChangeSet::plan`] turns a diff into concrete writes and
//! [`ReconcileResult`] accounts for how executing them went.
//!
//! ## Quick Start
//!
//! ```rust
//! use kvsync_engine::{diff, ChangeSet, Entry, Snapshot};
//!
//! let current = Snapshot::from_remote(vec![Entry::new("a", 1), Entry::new("b", 2)]);
//! let desired = Snapshot::from_desired(vec![Entry::new("b", 3), Entry::new("c", 4)]).unwrap();
//!
//! let d = diff(&current, &desired);
//! assert_eq!(d.add, vec!["c"]);
//! assert_eq!(d.del, vec!["a"]);
//! assert_eq!(d.chg[0].name, "b");
//!
//! let mut store = current.clone();
//! ChangeSet::plan(&d, &desired).apply_to(&mut store);
//! assert_eq!(store, desired);
//! ```

pub mod diff;
pub mod entry;
pub mod error;
pub mod reconcile;
pub mod snapshot;

// Re-export main types at crate root
pub use diff::{diff, Change, Diff};
pub use entry::{Entry, EntryValue};
pub use error::Error;
pub use reconcile::{ChangeSet, EntryError, MutationKind, ReconcileResult};
pub use snapshot::Snapshot;

/// Type alias for clarity
pub type EntryName = String;
