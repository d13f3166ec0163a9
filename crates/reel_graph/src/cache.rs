// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory frame cache keyed by content digest.

use crate::graph::{GraphError, NodeGraph};
use crate::hash::Digest;
use crate::node::NodeId;
use crate::table::NodeValueTable;
use crate::traverser::{CancelFlag, NodeTraverser, Traversal, TraverserBackend};
use indexmap::IndexMap;
use parking_lot::Mutex;
use reel_time::TimeRange;

/// Counters for a [`FrameCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: usize,
    /// Lookups that required evaluation
    pub misses: usize,
    /// Entries dropped to stay within capacity
    pub evictions: usize,
}

/// Bounded digest-keyed cache of evaluated tables
///
/// Identical digests imply identical content, so a hit can skip
/// evaluation entirely. Least recently used entries are evicted first.
#[derive(Debug)]
pub struct FrameCache {
    capacity: usize,
    memoize: bool,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: IndexMap<Digest, NodeValueTable>,
    stats: CacheStats,
}

impl FrameCache {
    /// Create a cache holding at most `capacity` tables
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            memoize: true,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Enable or disable per-traversal memoization on misses
    pub fn with_memoization(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Counters so far
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Look up a digest, marking it recently used
    pub fn get(&self, digest: &Digest) -> Option<NodeValueTable> {
        let mut inner = self.inner.lock();
        let index = inner.entries.get_index_of(digest)?;
        let last = inner.entries.len() - 1;
        inner.entries.move_index(index, last);
        inner.entries.get(digest).cloned()
    }

    /// Store a table under a digest
    pub fn insert(&self, digest: Digest, table: NodeValueTable) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        inner.entries.shift_remove(&digest);
        inner.entries.insert(digest, table);
        while inner.entries.len() > self.capacity {
            inner.entries.shift_remove_index(0);
            inner.stats.evictions += 1;
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Evaluate a node over a range, reusing a cached table when the
    /// content digest at the range's in point is already known
    pub fn render(
        &self,
        graph: &NodeGraph,
        backend: &dyn TraverserBackend,
        node: NodeId,
        range: TimeRange,
        cancel: &CancelFlag,
    ) -> Result<Traversal<(Digest, NodeValueTable)>, GraphError> {
        let digest = graph.hash(node, range.in_point())?;

        if let Some(table) = self.get(&digest) {
            self.inner.lock().stats.hits += 1;
            tracing::trace!("Cache hit for {node} at {range}");
            return Ok(Traversal::Complete((digest, table)));
        }
        self.inner.lock().stats.misses += 1;

        let result = NodeTraverser::new(graph, backend)
            .with_cancel(cancel.clone())
            .with_memoization(self.memoize)
            .generate_table(node, range);
        Ok(result.map(|table| {
            self.insert(digest, table.clone());
            (digest, table)
        }))
    }
}
