//! Commands Module
//!
//! Turns decoded protocol frames into store operations and wire responses.
//!
//! ## Responsibilities
//!
//! - Map each [`crate::protocol::Frame`] to exactly one
//!   [`crate::protocol::Response`]
//! - Convert wire `exptime` values into absolute expiry instants
//! - Keep the server counters (`cmd_get`, `cmd_set`, hits, misses) honest
//! - Honor `noreply` by swallowing the response, errors included

pub mod handler;

// Re-export commonly used types
pub use handler::CommandHandler;
