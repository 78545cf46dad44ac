//! Process-Wide Server Statistics
//!
//! A single counter registry shared by the store, the command dispatcher, and
//! every connection task. The `stats` command reads a snapshot of it.
//!
//! Counters are plain atomics with relaxed ordering: a reader may observe a
//! momentarily stale mix of values, but every mutation bumps each affected
//! counter exactly once. The `bytes` counter in particular is best-effort
//! diagnostics, not an accounting invariant.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters served by the `stats` command.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Items currently stored (including not-yet-purged expired items)
    pub curr_items: AtomicU64,
    /// Items ever stored
    pub total_items: AtomicU64,
    /// Approximate value bytes in use
    pub bytes: AtomicU64,
    /// Currently open client connections
    pub curr_connections: AtomicU64,
    /// Connections ever accepted
    pub total_connections: AtomicU64,
    /// `get` commands processed
    pub cmd_get: AtomicU64,
    /// `set` commands processed
    pub cmd_set: AtomicU64,
    /// Keys found by `get`
    pub get_hits: AtomicU64,
    /// Keys not found by `get`
    pub get_misses: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.curr_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.curr_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records a newly stored item of `bytes` value bytes.
    pub fn item_stored(&self, bytes: usize) {
        self.curr_items.fetch_add(1, Ordering::Relaxed);
        self.total_items.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records the removal of an item of `bytes` value bytes.
    pub fn item_removed(&self, bytes: usize) {
        self.curr_items.fetch_sub(1, Ordering::Relaxed);
        self.bytes.fetch_sub(bytes as u64, Ordering::Relaxed);
    }

    /// Records an in-place value replacement (`old` bytes became `new` bytes).
    pub fn value_resized(&self, old: usize, new: usize) {
        self.bytes.fetch_sub(old as u64, Ordering::Relaxed);
        self.bytes.fetch_add(new as u64, Ordering::Relaxed);
    }

    /// Resets the item counters after `flush_all`.
    pub fn items_flushed(&self) {
        self.curr_items.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
    }

    /// Returns the counters as name/value pairs, in the order the `stats`
    /// command reports them.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("curr_items", self.curr_items.load(Ordering::Relaxed)),
            ("total_items", self.total_items.load(Ordering::Relaxed)),
            ("bytes", self.bytes.load(Ordering::Relaxed)),
            (
                "curr_connections",
                self.curr_connections.load(Ordering::Relaxed),
            ),
            (
                "total_connections",
                self.total_connections.load(Ordering::Relaxed),
            ),
            ("cmd_get", self.cmd_get.load(Ordering::Relaxed)),
            ("cmd_set", self.cmd_set.load(Ordering::Relaxed)),
            ("get_hits", self.get_hits.load(Ordering::Relaxed)),
            ("get_misses", self.get_misses.load(Ordering::Relaxed)),
        ]
    }
}
