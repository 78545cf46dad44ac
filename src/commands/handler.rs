//! Command Dispatch
//!
//! [`CommandHandler`] maps every decoded [`Frame`] to exactly one
//! [`Response`]. This is where protocol semantics meet the store: the
//! decoder knows nothing about items, the store knows nothing about wire
//! text, and this module bridges the two.
//!
//! `noreply` is honored here: a storage or delete command that carried the
//! flag gets [`Response::NoReply`] no matter how the operation went, errors
//! included.

use crate::protocol::types::{FoundValue, Frame, InvalidFrame, Response, StorageVerb};
use crate::stats::ServerStats;
use crate::storage::{expiry_from_exptime, Store};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Executes decoded frames against the shared store.
///
/// Cheap to clone; one lives in each connection task.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
    stats: Arc<ServerStats>,
}

impl CommandHandler {
    pub fn new(store: Arc<Store>, stats: Arc<ServerStats>) -> Self {
        Self { store, stats }
    }

    /// Executes one frame and produces its wire response.
    ///
    /// Never fails: protocol-level problems arrive as [`Frame::Invalid`] and
    /// map to error responses, keeping the connection alive.
    pub fn execute(&self, frame: Frame) -> Response {
        match frame {
            Frame::Storage(cmd) => {
                let expires_at = expiry_from_exptime(cmd.exptime);
                let noreply = cmd.noreply;
                debug!(verb = %cmd.verb, key_len = cmd.key.len(), bytes = cmd.data.len(), "storage command");

                let stored = match cmd.verb {
                    StorageVerb::Set => {
                        self.stats.cmd_set.fetch_add(1, Ordering::Relaxed);
                        self.store.set(cmd.key, cmd.data, cmd.flags, expires_at);
                        true
                    }
                    StorageVerb::Add => self.store.add(cmd.key, cmd.data, cmd.flags, expires_at),
                    StorageVerb::Replace => {
                        self.store.replace(cmd.key, cmd.data, cmd.flags, expires_at)
                    }
                    StorageVerb::Append => self.store.append(&cmd.key, &cmd.data),
                    StorageVerb::Prepend => self.store.prepend(&cmd.key, &cmd.data),
                };

                if noreply {
                    Response::NoReply
                } else if stored {
                    Response::Stored
                } else {
                    Response::NotStored
                }
            }
            Frame::Get { keys } => {
                self.stats.cmd_get.fetch_add(1, Ordering::Relaxed);

                let mut values = Vec::with_capacity(keys.len());
                for key in keys {
                    match self.store.get(&key) {
                        Some(item) => {
                            self.stats.get_hits.fetch_add(1, Ordering::Relaxed);
                            values.push(FoundValue {
                                key,
                                flags: item.flags,
                                data: item.data,
                            });
                        }
                        None => {
                            self.stats.get_misses.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                Response::Values(values)
            }
            Frame::Delete { key } => {
                if self.store.delete(&key) {
                    Response::Deleted
                } else {
                    Response::NotFound
                }
            }
            Frame::FlushAll => {
                self.store.flush_all();
                Response::Ok
            }
            Frame::Stats => Response::Stats(self.stats.snapshot()),
            Frame::Quit => Response::NoReply,
            Frame::Invalid(invalid) => match invalid {
                InvalidFrame::BadCommandLine => Response::Error,
                InvalidFrame::KeyTooLong { noreply } => {
                    if noreply {
                        Response::NoReply
                    } else {
                        Response::ClientError("bad command line format")
                    }
                }
                InvalidFrame::ValueTooLarge { noreply } => {
                    if noreply {
                        Response::NoReply
                    } else {
                        Response::ServerError("object too large for cache")
                    }
                }
                InvalidFrame::BadDataChunk { noreply } => {
                    if noreply {
                        Response::NoReply
                    } else {
                        Response::ClientError("bad data chunk")
                    }
                }
            },
        }
    }
}
