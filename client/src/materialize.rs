//! Reading the full state of a remote map.
//!
//! Pages are fetched one after another, following the cursor until the
//! remote returns an empty one. A page cap bounds the loop against a backend
//! that never stops handing out cursors; hitting it yields a partial result
//! that still carries the unfinished cursor.

use crate::error::Result;
use crate::remote::{MapRef, MapStore};
use kvsync_engine::{Entry, Snapshot};
use std::future::Future;

/// Page cap for listings of unrelated resources that reuse the cursor pattern.
pub const RESOURCE_LIST_MAX_PAGES: usize = 20;

/// Items collected by [`drain_pages`].
#[derive(Debug, Clone, PartialEq)]
pub struct Drained<T> {
    pub items: Vec<T>,
    pub pages: usize,
    /// Non-empty when the cap stopped the loop early
    pub residual_cursor: String,
}

impl<T> Drained<T> {
    pub fn is_complete(&self) -> bool {
        self.residual_cursor.is_empty()
    }
}

/// Follow cursors until an empty one or `max_pages` pages, whichever first.
///
/// `fetch` receives the cursor (empty for the first page) and returns the
/// page items plus the next cursor. Any fetch error aborts the loop.
pub async fn drain_pages<T, F, Fut>(max_pages: usize, mut fetch: F) -> Result<Drained<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, String)>>,
{
    let mut items = Vec::new();
    let mut cursor = String::new();
    let mut pages = 0;

    while pages < max_pages.max(1) {
        let (page_items, next) = fetch(cursor).await?;
        pages += 1;
        items.extend(page_items);
        cursor = next;
        if cursor.is_empty() {
            break;
        }
    }

    Ok(Drained {
        items,
        pages,
        residual_cursor: cursor,
    })
}

/// A map snapshot together with how it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub snapshot: Snapshot,
    pub pages: usize,
}

impl Materialized {
    /// False when the page cap cut the listing short. The unfinished cursor
    /// is then available through `snapshot.cursor()`.
    pub fn is_complete(&self) -> bool {
        self.snapshot.is_complete()
    }
}

/// Read every entry of `map` into a deduplicated, sorted snapshot.
///
/// When a name shows up on more than one page, the later page wins.
pub async fn materialize<S: MapStore>(
    store: &S,
    map: &MapRef,
    max_pages: usize,
) -> Result<Materialized> {
    let drained: Drained<Entry> = drain_pages(max_pages, move |cursor| async move {
        let page = store.list_entries(map, &cursor).await?;
        Ok((page.entries, page.next_cursor))
    })
    .await?;

    if !drained.is_complete() {
        tracing::warn!(
            "Stopped reading {} after {} pages; snapshot is partial",
            map,
            drained.pages
        );
    }

    tracing::debug!(
        "Materialized {} entries from {} in {} pages",
        drained.items.len(),
        map,
        drained.pages
    );

    Ok(Materialized {
        snapshot: Snapshot::from_remote(drained.items).with_cursor(drained.residual_cursor),
        pages: drained.pages,
    })
}
