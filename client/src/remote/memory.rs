//! In-memory map store.
//!
//! Behaves like the remote API (cursor pagination, 404 on missing maps and
//! entries, 409 on existing maps) and can be told to fail writes for given
//! entry names. Every call is counted.

use super::{MapRef, MapStore, Page};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{Error, Result};
use kvsync_engine::{Entry, EntryValue, Snapshot};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    maps: HashMap<MapRef, BTreeMap<String, EntryValue>>,
    fail_put: HashSet<String>,
    fail_delete: HashSet<String>,
    list_calls: usize,
    put_calls: usize,
    delete_calls: usize,
}

/// A [`MapStore`] kept in process memory.
#[derive(Debug)]
pub struct MemoryMapStore {
    inner: Mutex<Inner>,
    page_size: usize,
}

impl Default for MemoryMapStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMapStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            page_size: DEFAULT_PAGE_SIZE as usize,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or replace) a map holding `entries`.
    pub fn seed(&self, map: &MapRef, entries: impl IntoIterator<Item = Entry>) {
        let contents = entries.into_iter().map(|e| (e.name, e.value)).collect();
        self.lock().maps.insert(map.clone(), contents);
    }

    /// Current contents of a map, or `None` if it does not exist.
    pub fn snapshot(&self, map: &MapRef) -> Option<Snapshot> {
        self.lock().maps.get(map).map(|contents| {
            Snapshot::from_remote(contents.iter().map(|(name, value)| Entry {
                name: name.clone(),
                value: value.clone(),
            }))
        })
    }

    /// Make every `put_entry` for `name` fail with HTTP 500.
    pub fn fail_put_for(&self, name: impl Into<String>) {
        self.lock().fail_put.insert(name.into());
    }

    /// Make every `delete_entry` for `name` fail with HTTP 500.
    pub fn fail_delete_for(&self, name: impl Into<String>) {
        self.lock().fail_delete.insert(name.into());
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn put_calls(&self) -> usize {
        self.lock().put_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.lock().delete_calls
    }

    /// Put and delete calls combined, failed ones included.
    pub fn write_calls(&self) -> usize {
        let inner = self.lock();
        inner.put_calls + inner.delete_calls
    }
}

fn not_found(what: &str) -> Error {
    Error::Remote {
        status: 404,
        body: format!("{{\"error\":\"{} not found\"}}", what),
    }
}

fn injected(name: &str) -> Error {
    Error::Remote {
        status: 500,
        body: format!("injected failure for {}", name),
    }
}

impl MapStore for MemoryMapStore {
    async fn list_entries(&self, map: &MapRef, cursor: &str) -> Result<Page> {
        let mut inner = self.lock();
        inner.list_calls += 1;
        let contents = inner
            .maps
            .get(map)
            .ok_or_else(|| not_found(&format!("map {}", map.map)))?;

        let lower = if cursor.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(cursor.to_string())
        };
        let mut remaining = contents.range((lower, Bound::Unbounded));

        let entries: Vec<Entry> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(name, value)| Entry {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();

        let next_cursor = match (remaining.next(), entries.last()) {
            (Some(_), Some(last)) => last.name.clone(),
            _ => String::new(),
        };

        Ok(Page::new(entries, next_cursor))
    }

    async fn put_entry(&self, map: &MapRef, entry: &Entry) -> Result<()> {
        let mut inner = self.lock();
        inner.put_calls += 1;
        if inner.fail_put.contains(&entry.name) {
            return Err(injected(&entry.name));
        }
        let contents = inner
            .maps
            .get_mut(map)
            .ok_or_else(|| not_found(&format!("map {}", map.map)))?;
        contents.insert(entry.name.clone(), entry.value.clone());
        Ok(())
    }

    async fn delete_entry(&self, map: &MapRef, name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.delete_calls += 1;
        if inner.fail_delete.contains(name) {
            return Err(injected(name));
        }
        let contents = inner
            .maps
            .get_mut(map)
            .ok_or_else(|| not_found(&format!("map {}", map.map)))?;
        contents
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(&format!("entry {}", name)))
    }

    async fn create_map(&self, map: &MapRef, _encrypted: bool) -> Result<()> {
        let mut inner = self.lock();
        if inner.maps.contains_key(map) {
            return Err(Error::Remote {
                status: 409,
                body: format!("{{\"error\":\"map {} already exists\"}}", map.map),
            });
        }
        inner.maps.insert(map.clone(), BTreeMap::new());
        Ok(())
    }
}
