//! Protocol Module
//!
//! Decoding and encoding for the memcached text protocol.
//!
//! ## Components
//!
//! - [`parser`]: the incremental [`CommandDecoder`] state machine
//! - [`types`]: decoded [`Frame`]s and wire [`Response`]s
//!
//! ## Data Flow
//!
//! ```text
//! TCP bytes --> CommandDecoder --> Frame --> dispatch --> Response --> TCP bytes
//! ```
//!
//! The decoder is deliberately ignorant of the store: it only frames and
//! tokenizes. Everything after the `Frame` boundary lives in
//! [`crate::commands`].

pub mod parser;
pub mod types;

// Re-export commonly used types
pub use parser::CommandDecoder;
pub use types::{
    FoundValue, Frame, InvalidFrame, Response, StorageCommand, StorageVerb, CRLF,
};
