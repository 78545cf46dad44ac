//! # Ferrocache - A Memcached-Compatible In-Memory Cache Server
//!
//! Ferrocache is an in-memory key-value cache server written in Rust that
//! speaks the classic memcached text protocol. It demonstrates systems
//! programming concepts like fine-grained locking, network programming,
//! and mixed text/binary protocol framing.
//!
//! ## Features
//!
//! - **Memcached-Compatible**: `set`/`get`/`add`/`replace`/`append`/`prepend`/
//!   `delete`/`flush_all`/`stats` over the text protocol on port 11211
//! - **Fine-Grained Locking**: 10007 independently locked buckets allow
//!   unrelated keys to be accessed fully concurrently
//! - **Lazy Expiration**: items carry a TTL and are purged by the next access
//!   that observes them expired
//! - **Async I/O**: Built on Tokio, one task per client connection
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                            Ferrocache                              │
//! │                                                                    │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐             │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │             │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │             │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘             │
//! │                                               │                    │
//! │                                               ▼                    │
//! │  ┌─────────────┐    ┌────────────────────────────────────────────┐ │
//! │  │  Command    │    │                  Store                     │ │
//! │  │  Decoder    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌─────┐  │ │
//! │  │             │    │  │Bucket 0│ │Bucket 1│ │Bucket 2│ │...  │  │ │
//! │  └─────────────┘    │  │ Mutex  │ │ Mutex  │ │ Mutex  │ │10007│  │ │
//! │                     │  └────────┘ └────────┘ └────────┘ └─────┘  │ │
//! │                     └────────────────────────────────────────────┘ │
//! │                                               ▲                    │
//! │                                               │                    │
//! │                                       ┌───────┴───────┐            │
//! │                                       │  ServerStats  │            │
//! │                                       └───────────────┘            │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ferrocache::commands::CommandHandler;
//! use ferrocache::connection::handle_connection;
//! use ferrocache::stats::ServerStats;
//! use ferrocache::storage::Store;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let stats = Arc::new(ServerStats::new());
//!     let store = Arc::new(Store::new(Arc::clone(&stats)));
//!
//!     let listener = TcpListener::bind("127.0.0.1:11211").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let handler = CommandHandler::new(Arc::clone(&store), Arc::clone(&stats));
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(stream, addr, handler, stats));
//!     }
//! }
//! ```
//!
//! ## Wire Protocol
//!
//! Storage commands declare an exact payload length and are followed by a raw
//! data block that may contain any byte value, including CR and LF:
//!
//! ```text
//! set <key> <flags> <exptime> <bytes> [noreply]\r\n
//! <data block of exactly <bytes> bytes>\r\n
//! ```
//!
//! Retrieval and control commands are single CRLF-terminated lines:
//! `get <key> [<key> ...]`, `delete <key>`, `flush_all`, `stats`, `quit`.
//!
//! ## Design Highlights
//!
//! ### Thread Safety
//!
//! The store uses 10007 buckets, each guarded by its own mutex. Operations on
//! keys in different buckets never contend; operations on the same key are
//! serialized by that key's bucket lock. Conditional operations (`add`,
//! `replace`, `append`, `prepend`) perform their existence check and mutation
//! inside a single critical section, so racing `add`s on one key produce
//! exactly one winner.
//!
//! ### Lazy Expiration
//!
//! An item with a TTL becomes invisible the instant it expires; the next
//! access that observes it removes it. There is no background sweep.
//!
//! ## Module Overview
//!
//! - [`protocol`]: text-protocol decoder and response types
//! - [`storage`]: bucket-locked store with lazy expiration
//! - [`commands`]: dispatch from decoded commands to store operations
//! - [`connection`]: client connection management
//! - [`stats`]: process-wide counters served by the `stats` command

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod stats;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionError, ConnectionHandler};
pub use protocol::{CommandDecoder, Frame, Response, StorageVerb};
pub use stats::ServerStats;
pub use storage::{Item, Store};

/// The default port Ferrocache listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host Ferrocache binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of Ferrocache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
