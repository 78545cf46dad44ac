//! Storage Module
//!
//! The core store for Ferrocache: a hash table split into 10007 buckets,
//! each behind its own mutex, with read-time (lazy) expiration.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────────┐       │
//! │  │Bucket 0 │ │Bucket 1 │ │Bucket 2 │ │...10007     │       │
//! │  │ Mutex   │ │ Mutex   │ │ Mutex   │ │  buckets    │       │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Per-Bucket Locking**: unrelated keys proceed fully in parallel
//! - **Lazy Expiry**: expired items are purged by the access that sees them
//! - **Atomic Conditionals**: `add`/`replace`/`append`/`prepend` check and
//!   mutate under a single held lock
//!
//! ## Example
//!
//! ```
//! use ferrocache::stats::ServerStats;
//! use ferrocache::storage::Store;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let stats = Arc::new(ServerStats::new());
//! let store = Store::new(Arc::clone(&stats));
//!
//! store.set(Bytes::from("name"), Bytes::from("Ariz"), 0, None);
//! let item = store.get(b"name").unwrap();
//! assert_eq!(item.data, Bytes::from("Ariz"));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{
    expiry_from_exptime, Item, Store, BUCKET_COUNT, MAX_KEY_LEN, MAX_VALUE_SIZE,
    RELATIVE_TTL_CUTOFF,
};
