//! Remote key-value map access.
//!
//! [`MapStore`] is the thin transport the materializer and reconciler run
//! against. It has no retries; callers decide what to do with a failure.

mod http;
mod memory;

pub use http::HttpMapClient;
pub use memory::MemoryMapStore;

use crate::error::Result;
use kvsync_engine::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Identifies one map: organization, environment and map name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapRef {
    pub organization: String,
    pub environment: String,
    pub map: String,
}

impl MapRef {
    pub fn new(
        organization: impl Into<String>,
        environment: impl Into<String>,
        map: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            environment: environment.into(),
            map: map.into(),
        }
    }
}

impl fmt::Display for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.environment, self.map)
    }
}

/// One page of a map listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub entries: Vec<Entry>,
    /// Cursor for the next page, empty on the last one
    pub next_cursor: String,
}

impl Page {
    pub fn new(entries: Vec<Entry>, next_cursor: impl Into<String>) -> Self {
        Self {
            entries,
            next_cursor: next_cursor.into(),
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_empty()
    }
}

/// Per-key access to remote key-value maps.
pub trait MapStore: Send + Sync {
    /// Fetch a single page. `cursor` is empty for the first page.
    fn list_entries(
        &self,
        map: &MapRef,
        cursor: &str,
    ) -> impl Future<Output = Result<Page>> + Send;

    /// Create or replace a single entry.
    fn put_entry(&self, map: &MapRef, entry: &Entry) -> impl Future<Output = Result<()>> + Send;

    /// Remove a single entry. A missing entry is reported as a 404 error.
    fn delete_entry(&self, map: &MapRef, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Provision a new, empty map. An existing map is reported as a 409 error.
    fn create_map(&self, map: &MapRef, encrypted: bool)
        -> impl Future<Output = Result<()>> + Send;
}
