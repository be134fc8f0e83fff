//! Read-through caches invalidated by the watch mechanism.
//!
//! Each of the three read operations memoizes per path, independently of
//! the others. A miss issues the underlying watched call with an
//! invalidator that removes exactly that entry when the one-shot watch
//! fires; the next read then re-fetches and re-subscribes. Entries have
//! no TTL - growth across distinct paths is unbounded by design (the
//! alternative, eviction, would drop entries whose watch is still
//! outstanding and break the one-watch-per-entry bookkeeping).

use std::sync::Arc;
use std::sync::Weak;

use bytes::Bytes;
use dashmap::DashMap;

use super::ClientInner;
use super::SessionClient;
use crate::metrics::CACHE_HIT_METRIC;
use crate::metrics::CACHE_MISS_METRIC;
use crate::RawWatcher;
use crate::Result;
use crate::Stat;

/// Which of the per-operation caches an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOp {
    Exists,
    GetData,
    GetChildren,
}

impl CacheOp {
    fn label(&self) -> &'static str {
        match self {
            CacheOp::Exists => "exists",
            CacheOp::GetData => "get_data",
            CacheOp::GetChildren => "get_children",
        }
    }
}

/// The three per-operation path caches.
///
/// Entry presence is the "cached" marker: `exists` legitimately caches
/// `None` for a node that is absent, distinguishable from "not cached"
/// through the map lookup itself. The calling task populates entries and
/// the dispatch context removes them; every access is a tightly-scoped
/// critical section inside the map's shard locks.
pub(crate) struct WatchCache {
    exists: DashMap<String, Option<Stat>>,
    data: DashMap<String, (Bytes, Stat)>,
    children: DashMap<String, Vec<String>>,
}

impl WatchCache {
    pub(crate) fn new() -> Self {
        Self {
            exists: DashMap::new(),
            data: DashMap::new(),
            children: DashMap::new(),
        }
    }

    /// Drops every entry. Used when the session (and with it every
    /// outstanding watch) is gone.
    pub(crate) fn invalidate_all(&self) {
        self.exists.clear();
        self.data.clear();
        self.children.clear();
    }

    fn remove(
        &self,
        op: CacheOp,
        path: &str,
    ) {
        match op {
            CacheOp::Exists => {
                self.exists.remove(path);
            }
            CacheOp::GetData => {
                self.data.remove(path);
            }
            CacheOp::GetChildren => {
                self.children.remove(path);
            }
        }
    }
}

impl SessionClient {
    /// Cached variant of [`exists`](SessionClient::exists).
    ///
    /// The first read per path fetches through the transport and leaves
    /// the invalidating watch; until that watch fires, repeat reads are
    /// served from memory without touching the transport. A cached
    /// `None` ("node absent") is a hit like any other value.
    pub async fn cached_exists(
        &self,
        path: &str,
    ) -> Result<Option<Stat>> {
        if let Some(hit) = self.inner.caches.exists.get(path) {
            CACHE_HIT_METRIC
                .with_label_values(&[CacheOp::Exists.label()])
                .inc();
            return Ok(*hit);
        }
        CACHE_MISS_METRIC
            .with_label_values(&[CacheOp::Exists.label()])
            .inc();

        let slot = self.current_slot()?;
        let invalidator = invalidator(&self.inner, CacheOp::Exists, path);
        // a failed fetch stores nothing
        let stat = slot.session.exists(path, Some(invalidator)).await?;
        self.inner.caches.exists.insert(path.to_string(), stat);
        Ok(stat)
    }

    /// Cached variant of [`get_data`](SessionClient::get_data)
    pub async fn cached_get_data(
        &self,
        path: &str,
    ) -> Result<(Bytes, Stat)> {
        if let Some(hit) = self.inner.caches.data.get(path) {
            CACHE_HIT_METRIC
                .with_label_values(&[CacheOp::GetData.label()])
                .inc();
            return Ok(hit.clone());
        }
        CACHE_MISS_METRIC
            .with_label_values(&[CacheOp::GetData.label()])
            .inc();

        let slot = self.current_slot()?;
        let invalidator = invalidator(&self.inner, CacheOp::GetData, path);
        let result = slot.session.get_data(path, Some(invalidator)).await?;
        self.inner
            .caches
            .data
            .insert(path.to_string(), result.clone());
        Ok(result)
    }

    /// Cached variant of [`get_children`](SessionClient::get_children)
    pub async fn cached_get_children(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        if let Some(hit) = self.inner.caches.children.get(path) {
            CACHE_HIT_METRIC
                .with_label_values(&[CacheOp::GetChildren.label()])
                .inc();
            return Ok(hit.clone());
        }
        CACHE_MISS_METRIC
            .with_label_values(&[CacheOp::GetChildren.label()])
            .inc();

        let slot = self.current_slot()?;
        let invalidator = invalidator(&self.inner, CacheOp::GetChildren, path);
        let children = slot.session.get_children(path, Some(invalidator)).await?;
        self.inner
            .caches
            .children
            .insert(path.to_string(), children.clone());
        Ok(children)
    }
}

/// One-shot watcher that removes exactly one `(operation, path)` entry.
///
/// Holds the client weakly: an outstanding watch on the transport side
/// must not keep a dropped client alive.
fn invalidator(
    inner: &Arc<ClientInner>,
    op: CacheOp,
    path: &str,
) -> RawWatcher {
    let weak: Weak<ClientInner> = Arc::downgrade(inner);
    let path = path.to_string();
    Arc::new(move |_event| {
        if let Some(inner) = weak.upgrade() {
            inner.caches.remove(op, &path);
        }
    })
}
