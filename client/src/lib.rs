//! # kvsync
//!
//! Reconciles remote key-value maps against a locally authored desired state.
//!
//! The remote store only offers paginated listing and per-key writes. kvsync
//! reads the whole map ([`materialize`]), diffs it against the desired
//! snapshot with the pure [`kvsync_engine`] crate, and converges the map with
//! the smallest set of per-key writes ([`Reconciler`]).
//!
//! Credentials and scope are explicit: an [`HttpMapClient`] carries one
//! bearer token, and every call names its [`MapRef`]. Nothing is cached
//! between calls.
//!
//! ```no_run
//! use kvsync::{HttpMapClient, MapRef, ReconcileOptions, Reconciler, Snapshot};
//! use std::time::Duration;
//!
//! # async fn run() -> kvsync::Result<()> {
//! let client = HttpMapClient::new("https://apigee.googleapis.com/v1", "token", Duration::from_secs(30))?;
//! let map = MapRef::new("acme", "prod", "settings");
//! let desired = Snapshot::from_json(r#"{"timeout": 30, "mode": "strict"}"#)?;
//!
//! let reconciler = Reconciler::new(&client, ReconcileOptions::default());
//! let outcome = reconciler.reconcile(&map, &desired).await?;
//! println!("{}", outcome.result);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod materialize;
pub mod reconcile;
pub mod remote;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use materialize::{drain_pages, materialize, Drained, Materialized};
pub use reconcile::{MapProvision, ReconcileOptions, Reconciler, Reconciliation};
pub use remote::{HttpMapClient, MapRef, MapStore, MemoryMapStore, Page};

// Engine types callers need alongside the reconciler
pub use kvsync_engine::{
    diff, Change, ChangeSet, Diff, Entry, EntryError, EntryValue, MutationKind, ReconcileResult,
    Snapshot,
};
