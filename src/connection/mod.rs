//! Connection Module
//!
//! TCP connection lifecycle: one tokio task per client, each owning its
//! socket, read buffer, and decoder state.
//!
//! ## Lifecycle
//!
//! ```text
//! accept --> connection_opened --> run loop --> connection_closed
//!                     |                |
//!                     |                ├── decode frames from buffer
//!                     |                ├── execute against the store
//!                     |                └── write responses, flush, read
//!                     └── counters in ServerStats
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler};
