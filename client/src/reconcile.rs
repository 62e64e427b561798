//! Converging a remote map to a desired snapshot.
//!
//! # Flow
//!
//! 1. Validate the desired snapshot (no remote call on failure)
//! 2. Materialize the current state
//! 3. Diff current against desired
//! 4. Dry run: stop here and report planned counts
//! 5. Execute creates, then updates, then deletes
//!
//! A failed write is recorded in the result and the remaining writes still
//! run. Writes inside one phase may be in flight together; a phase starts
//! only after the previous one finished.

use crate::config::{Config, DEFAULT_CONCURRENCY, DEFAULT_MAX_PAGES};
use crate::error::{Error, Result};
use crate::materialize::{materialize, Materialized};
use crate::remote::{MapRef, MapStore};
use futures::stream::{self, StreamExt};
use kvsync_engine::{diff, ChangeSet, Diff, Entry, MutationKind, ReconcileResult, Snapshot};
use serde::Serialize;

/// Knobs for a reconcile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Compute the diff without writing anything
    pub dry_run: bool,
    /// Writes in flight within one phase
    pub concurrency: usize,
    /// Page cap when reading the current state
    pub max_pages: usize,
    /// Refuse to write when the current state was truncated
    pub require_complete: bool,
    /// Read a map that does not exist yet as empty
    pub missing_map_is_empty: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: DEFAULT_CONCURRENCY,
            max_pages: DEFAULT_MAX_PAGES,
            require_complete: false,
            missing_map_is_empty: false,
        }
    }
}

impl ReconcileOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency,
            max_pages: config.max_pages,
            ..Self::default()
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn require_complete(mut self, require_complete: bool) -> Self {
        self.require_complete = require_complete;
        self
    }

    /// Used when the map is about to be provisioned, so a dry run can
    /// preview populating it.
    pub fn missing_map_is_empty(mut self, missing_map_is_empty: bool) -> Self {
        self.missing_map_is_empty = missing_map_is_empty;
        self
    }
}

/// What a reconcile run found and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub diff: Diff,
    pub result: ReconcileResult,
}

/// Outcome of [`Reconciler::ensure_map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapProvision {
    Created,
    AlreadyExists,
}

/// A single remote write.
enum Write {
    Put(Entry),
    Delete(String),
}

/// Drives a [`MapStore`] toward desired state.
///
/// Holds no state between calls; every run reads the remote afresh.
pub struct Reconciler<'a, S> {
    store: &'a S,
    options: ReconcileOptions,
}

impl<'a, S: MapStore> Reconciler<'a, S> {
    pub fn new(store: &'a S, options: ReconcileOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Read the current state of `map`.
    pub async fn materialize(&self, map: &MapRef) -> Result<Materialized> {
        match materialize(self.store, map, self.options.max_pages).await {
            Err(e) if e.is_not_found() && self.options.missing_map_is_empty => {
                tracing::debug!("Map {} does not exist yet, reading it as empty", map);
                Ok(Materialized {
                    snapshot: Snapshot::new(),
                    pages: 0,
                })
            }
            other => other,
        }
    }

    /// Diff the current state of `map` against `desired` without writing.
    pub async fn preview(&self, map: &MapRef, desired: &Snapshot) -> Result<Diff> {
        desired.validate()?;
        let current = self.materialize(map).await?;
        Ok(diff(&current.snapshot, desired))
    }

    /// Converge `map` to `desired`.
    ///
    /// Returns `Err` only when nothing was written: invalid desired state, a
    /// failed read, or a truncated read under `require_complete`. Failed
    /// writes land in `result.errors`.
    pub async fn reconcile(&self, map: &MapRef, desired: &Snapshot) -> Result<Reconciliation> {
        desired.validate()?;

        let current = self.materialize(map).await?;
        let complete = current.is_complete();
        let diff = diff(&current.snapshot, desired);

        if self.options.dry_run {
            let mut result = ReconcileResult::preview(&diff);
            result.snapshot_complete = complete;
            tracing::info!("Dry run for {}: {}", map, result);
            return Ok(Reconciliation { diff, result });
        }

        if !complete && self.options.require_complete {
            return Err(Error::IncompleteSnapshot {
                pages: current.pages,
            });
        }

        let changes = ChangeSet::plan(&diff, desired);
        let mut result = ReconcileResult::new();
        result.snapshot_complete = complete;

        let creates = changes.creates.into_iter().map(Write::Put).collect();
        self.run_phase(map, MutationKind::Create, creates, &mut result)
            .await;

        let updates = changes
            .updates
            .into_iter()
            .map(|change| {
                Write::Put(Entry {
                    name: change.name,
                    value: change.to,
                })
            })
            .collect();
        self.run_phase(map, MutationKind::Update, updates, &mut result)
            .await;

        let deletes = changes.deletes.into_iter().map(Write::Delete).collect();
        self.run_phase(map, MutationKind::Delete, deletes, &mut result)
            .await;

        if result.has_errors() {
            tracing::warn!("Partially reconciled {}: {}", map, result);
        } else {
            tracing::info!("Reconciled {}: {}", map, result);
        }

        Ok(Reconciliation { diff, result })
    }

    /// Create `map` unless it already exists.
    pub async fn ensure_map(&self, map: &MapRef, encrypted: bool) -> Result<MapProvision> {
        match self.store.create_map(map, encrypted).await {
            Ok(()) => {
                tracing::info!("Created map {}", map);
                Ok(MapProvision::Created)
            }
            Err(e) if e.is_already_exists() => {
                tracing::debug!("Map {} already exists", map);
                Ok(MapProvision::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn run_phase(
        &self,
        map: &MapRef,
        kind: MutationKind,
        writes: Vec<Write>,
        result: &mut ReconcileResult,
    ) {
        if writes.is_empty() {
            return;
        }

        let store = self.store;
        let mut outcomes: Vec<(String, Result<()>)> = stream::iter(writes)
            .map(move |write| async move {
                match write {
                    Write::Put(entry) => {
                        let outcome = store.put_entry(map, &entry).await;
                        (entry.name, outcome)
                    }
                    Write::Delete(name) => {
                        let outcome = store.delete_entry(map, &name).await;
                        (name, outcome)
                    }
                }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        // Completion order is arbitrary; report in name order.
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    tracing::debug!("{} {} in {}", kind, name, map);
                    result.record_success(kind);
                }
                Err(e) if kind == MutationKind::Delete && e.is_not_found() => {
                    tracing::debug!("{} already absent from {}", name, map);
                    result.record_success(kind);
                }
                Err(e) => {
                    tracing::warn!("Failed to {} {} in {}: {}", kind, name, map, e);
                    result.record_failure(kind, name, e.to_string());
                }
            }
        }
    }
}
