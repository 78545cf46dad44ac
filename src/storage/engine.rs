//! Bucket-Locked Store with Lazy Expiration
//!
//! This module implements the core store for Ferrocache: a hash table split
//! into a fixed number of buckets, each guarded by its own mutex.
//!
//! ## Design Decisions
//!
//! 1. **Per-Bucket Locks**: keys that hash to different buckets never contend;
//!    operations on one key are serialized by that key's bucket lock.
//! 2. **Atomic Check-Then-Act**: conditional operations (`add`, `replace`,
//!    `append`, `prepend`) perform the existence check and the mutation in a
//!    single critical section, so racing `add`s produce exactly one winner.
//! 3. **Lazy Expiry**: an expired item is removed by the next access that
//!    observes it; there is no background sweep.
//! 4. **No Eviction**: the store grows until items are deleted, expired, or
//!    flushed. There is no capacity bound.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────────┐       │
//! │  │Bucket 0 │ │Bucket 1 │ │Bucket 2 │ │...bucket N  │       │
//! │  │ Mutex   │ │ Mutex   │ │ Mutex   │ │(N = 10007)  │       │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │             │       │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bucket locks are held only around in-memory mutation, never across
//! socket I/O.

use crate::stats::ServerStats;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of buckets. A prime spreads djb2 hashes evenly.
pub const BUCKET_COUNT: usize = 10007;

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 250;

/// Maximum value size in bytes (1 MiB).
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Exptime values up to this many seconds (30 days) are relative to now;
/// anything larger is an absolute Unix timestamp.
pub const RELATIVE_TTL_CUTOFF: i64 = 2_592_000;

/// A stored cache item.
///
/// `flags` is an opaque client tag, stored and echoed back verbatim.
#[derive(Debug, Clone)]
pub struct Item {
    /// The value bytes
    pub data: Bytes,
    /// Opaque 32-bit client tag, never interpreted by the server
    pub flags: u32,
    /// When this item expires (None = never)
    pub expires_at: Option<SystemTime>,
}

impl Item {
    #[inline]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// Converts a wire `exptime` into an absolute expiry instant.
///
/// - `0` means never expires
/// - a negative value means already expired
/// - values up to [`RELATIVE_TTL_CUTOFF`] are seconds from now
/// - larger values are absolute Unix timestamps
pub fn expiry_from_exptime(exptime: i64) -> Option<SystemTime> {
    match exptime {
        0 => None,
        t if t < 0 => Some(UNIX_EPOCH),
        t if t <= RELATIVE_TTL_CUTOFF => Some(SystemTime::now() + Duration::from_secs(t as u64)),
        t => Some(UNIX_EPOCH + Duration::from_secs(t as u64)),
    }
}

/// djb2 over the key bytes; any well-distributed hash would do, this one
/// only has to be deterministic.
#[inline]
fn djb2(key: &[u8]) -> u32 {
    let mut hash: u32 = 5381;
    for &byte in key {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u32);
    }
    hash
}

/// The cache store shared by every connection.
///
/// Constructed once at startup, wrapped in an `Arc`, and handed to each
/// connection task. All operations are thread-safe; see the module docs for
/// the locking model.
pub struct Store {
    buckets: Vec<Mutex<HashMap<Bytes, Item>>>,
    stats: Arc<ServerStats>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl Store {
    /// Creates an empty store reporting into `stats`.
    pub fn new(stats: Arc<ServerStats>) -> Self {
        let buckets = (0..BUCKET_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self { buckets, stats }
    }

    #[inline]
    fn bucket(&self, key: &[u8]) -> &Mutex<HashMap<Bytes, Item>> {
        &self.buckets[djb2(key) as usize % BUCKET_COUNT]
    }

    /// Looks up a key.
    ///
    /// Returns `None` for absent keys and for expired ones; an expired entry
    /// is removed as a side effect of being observed.
    pub fn get(&self, key: &[u8]) -> Option<Item> {
        let mut map = self.bucket(key).lock().unwrap();
        let now = SystemTime::now();

        let expired = matches!(map.get(key), Some(item) if item.is_expired(now));
        if expired {
            if let Some(old) = map.remove(key) {
                self.stats.item_removed(old.data.len());
            }
            return None;
        }

        map.get(key).cloned()
    }

    /// Unconditional insert-or-replace.
    pub fn set(&self, key: Bytes, data: Bytes, flags: u32, expires_at: Option<SystemTime>) {
        let new_len = data.len();
        let mut map = self.bucket(&key).lock().unwrap();

        match map.insert(
            key,
            Item {
                data,
                flags,
                expires_at,
            },
        ) {
            Some(old) => self.stats.value_resized(old.data.len(), new_len),
            None => self.stats.item_stored(new_len),
        }
    }

    /// Inserts only if no live item exists under `key`.
    ///
    /// The existence check and the insert happen under one bucket lock, so
    /// concurrent `add`s on the same key see exactly one success.
    pub fn add(&self, key: Bytes, data: Bytes, flags: u32, expires_at: Option<SystemTime>) -> bool {
        let mut map = self.bucket(&key).lock().unwrap();
        let now = SystemTime::now();

        if let Some(existing) = map.get(&key) {
            if !existing.is_expired(now) {
                return false;
            }
            // dead entry under this key; purge it and treat the add as fresh
            if let Some(old) = map.remove(&key) {
                self.stats.item_removed(old.data.len());
            }
        }

        let new_len = data.len();
        map.insert(
            key,
            Item {
                data,
                flags,
                expires_at,
            },
        );
        self.stats.item_stored(new_len);
        true
    }

    /// Replaces the value only if a live item exists under `key`.
    pub fn replace(
        &self,
        key: Bytes,
        data: Bytes,
        flags: u32,
        expires_at: Option<SystemTime>,
    ) -> bool {
        let mut map = self.bucket(&key).lock().unwrap();
        let now = SystemTime::now();

        let expired = matches!(map.get(&key), Some(item) if item.is_expired(now));
        if expired {
            if let Some(old) = map.remove(&key) {
                self.stats.item_removed(old.data.len());
            }
            return false;
        }

        match map.get_mut(&key) {
            Some(item) => {
                self.stats.value_resized(item.data.len(), data.len());
                item.data = data;
                item.flags = flags;
                item.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// Appends `suffix` to a live item's value, preserving its flags and
    /// expiry. Fails if the key is absent or expired.
    pub fn append(&self, key: &[u8], suffix: &[u8]) -> bool {
        self.concat(key, suffix, false)
    }

    /// Prepends `prefix` to a live item's value, preserving its flags and
    /// expiry. Fails if the key is absent or expired.
    pub fn prepend(&self, key: &[u8], prefix: &[u8]) -> bool {
        self.concat(key, prefix, true)
    }

    fn concat(&self, key: &[u8], extra: &[u8], front: bool) -> bool {
        let mut map = self.bucket(key).lock().unwrap();
        let now = SystemTime::now();

        let expired = matches!(map.get(key), Some(item) if item.is_expired(now));
        if expired {
            if let Some(old) = map.remove(key) {
                self.stats.item_removed(old.data.len());
            }
            return false;
        }

        match map.get_mut(key) {
            Some(item) => {
                let mut joined = BytesMut::with_capacity(item.data.len() + extra.len());
                if front {
                    joined.extend_from_slice(extra);
                    joined.extend_from_slice(&item.data);
                } else {
                    joined.extend_from_slice(&item.data);
                    joined.extend_from_slice(extra);
                }
                self.stats.value_resized(item.data.len(), joined.len());
                item.data = joined.freeze();
                true
            }
            None => false,
        }
    }

    /// Removes a key if present, expired or not.
    ///
    /// Returns whether anything was removed.
    pub fn delete(&self, key: &[u8]) -> bool {
        let mut map = self.bucket(key).lock().unwrap();
        match map.remove(key) {
            Some(old) => {
                self.stats.item_removed(old.data.len());
                true
            }
            None => false,
        }
    }

    /// Clears every bucket (locked one at a time) and resets the item
    /// counters.
    pub fn flush_all(&self) {
        for bucket in &self.buckets {
            bucket.lock().unwrap().clear();
        }
        self.stats.items_flushed();
    }

    /// Counts live entries by walking every bucket. Diagnostic only.
    pub fn len(&self) -> usize {
        let now = SystemTime::now();
        self.buckets
            .iter()
            .map(|b| {
                b.lock()
                    .unwrap()
                    .values()
                    .filter(|item| !item.is_expired(now))
                    .count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
