//! Memcached Text Protocol Types
//!
//! This module defines the decoded command representation ([`Frame`]) and the
//! wire responses ([`Response`]) for the memcached text protocol.
//!
//! ## Protocol Format
//!
//! Commands are CRLF-terminated lines. Storage commands additionally carry a
//! raw data block of a declared exact length:
//!
//! ```text
//! set <key> <flags> <exptime> <bytes> [noreply]\r\n
//! <data block>\r\n
//! get <key> [<key> ...]\r\n
//! delete <key>\r\n
//! flush_all\r\n
//! stats\r\n
//! quit\r\n
//! ```
//!
//! Responses are CRLF-terminated as well: `STORED`, `NOT_STORED`, `DELETED`,
//! `NOT_FOUND`, `OK`, `END`, `ERROR`, `CLIENT_ERROR <msg>`,
//! `SERVER_ERROR <msg>`, and for retrievals
//! `VALUE <key> <flags> <bytes>\r\n<data>\r\n` blocks terminated by `END`.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used throughout the text protocol
pub const CRLF: &[u8] = b"\r\n";

/// The five storage verbs that carry a payload block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageVerb {
    Set,
    Add,
    Replace,
    Append,
    Prepend,
}

impl StorageVerb {
    /// Maps a lowercased verb token to a storage verb, if it is one.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "set" => Some(StorageVerb::Set),
            "add" => Some(StorageVerb::Add),
            "replace" => Some(StorageVerb::Replace),
            "append" => Some(StorageVerb::Append),
            "prepend" => Some(StorageVerb::Prepend),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageVerb::Set => "set",
            StorageVerb::Add => "add",
            StorageVerb::Replace => "replace",
            StorageVerb::Append => "append",
            StorageVerb::Prepend => "prepend",
        }
    }
}

impl fmt::Display for StorageVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully decoded storage command, header plus payload block.
///
/// `flags` and `exptime` are present for every storage verb because the wire
/// grammar requires the tokens; the store ignores them for `append` and
/// `prepend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCommand {
    pub verb: StorageVerb,
    pub key: Bytes,
    pub flags: u32,
    pub exptime: i64,
    pub data: Bytes,
    pub noreply: bool,
}

/// A decoded command frame, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `set`/`add`/`replace`/`append`/`prepend` with payload
    Storage(StorageCommand),
    /// `get` with one or more keys
    Get { keys: Vec<Bytes> },
    /// `delete <key>`
    Delete { key: Bytes },
    /// `flush_all`
    FlushAll,
    /// `stats`
    Stats,
    /// `quit` - the connection closes without a response
    Quit,
    /// Malformed input that still has a well-defined error response
    Invalid(InvalidFrame),
}

/// Protocol-level failures. The connection stays open; each variant maps to
/// an error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidFrame {
    /// Unknown verb, missing fields, or a non-numeric numeric field
    BadCommandLine,
    /// A key longer than the 250-byte limit
    KeyTooLong { noreply: bool },
    /// A declared payload length over the value size limit; the payload has
    /// already been drained from the stream by the time this frame is seen
    ValueTooLarge { noreply: bool },
    /// The payload block was not followed by CRLF; the stream has been
    /// resynchronized to the next line
    BadDataChunk { noreply: bool },
}

/// One hit returned by `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundValue {
    pub key: Bytes,
    pub flags: u32,
    pub data: Bytes,
}

/// A protocol response, serialized to the wire with [`Response::serialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `STORED`
    Stored,
    /// `NOT_STORED`
    NotStored,
    /// `DELETED`
    Deleted,
    /// `NOT_FOUND`
    NotFound,
    /// `OK`
    Ok,
    /// `VALUE` blocks for each hit, terminated by `END`
    Values(Vec<FoundValue>),
    /// `STAT <name> <value>` lines terminated by `END`
    Stats(Vec<(&'static str, u64)>),
    /// `ERROR`
    Error,
    /// `CLIENT_ERROR <message>`
    ClientError(&'static str),
    /// `SERVER_ERROR <message>`
    ServerError(&'static str),
    /// Nothing goes on the wire (noreply, quit)
    NoReply,
}

impl Response {
    /// Serializes the response to its wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    ///
    /// This is more efficient than `serialize()` when you want to reuse a
    /// buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => buf.extend_from_slice(b"STORED\r\n"),
            Response::NotStored => buf.extend_from_slice(b"NOT_STORED\r\n"),
            Response::Deleted => buf.extend_from_slice(b"DELETED\r\n"),
            Response::NotFound => buf.extend_from_slice(b"NOT_FOUND\r\n"),
            Response::Ok => buf.extend_from_slice(b"OK\r\n"),
            Response::Values(values) => {
                for value in values {
                    buf.extend_from_slice(b"VALUE ");
                    buf.extend_from_slice(&value.key);
                    buf.extend_from_slice(
                        format!(" {} {}", value.flags, value.data.len()).as_bytes(),
                    );
                    buf.extend_from_slice(CRLF);
                    buf.extend_from_slice(&value.data);
                    buf.extend_from_slice(CRLF);
                }
                buf.extend_from_slice(b"END\r\n");
            }
            Response::Stats(counters) => {
                for (name, value) in counters {
                    buf.extend_from_slice(format!("STAT {} {}", name, value).as_bytes());
                    buf.extend_from_slice(CRLF);
                }
                buf.extend_from_slice(b"END\r\n");
            }
            Response::Error => buf.extend_from_slice(b"ERROR\r\n"),
            Response::ClientError(msg) => {
                buf.extend_from_slice(b"CLIENT_ERROR ");
                buf.extend_from_slice(msg.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::ServerError(msg) => {
                buf.extend_from_slice(b"SERVER_ERROR ");
                buf.extend_from_slice(msg.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::NoReply => {}
        }
    }

    /// Returns true if nothing should be written for this response.
    pub fn is_empty(&self) -> bool {
        matches!(self, Response::NoReply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_responses() {
        assert_eq!(Response::Stored.serialize(), b"STORED\r\n");
        assert_eq!(Response::NotStored.serialize(), b"NOT_STORED\r\n");
        assert_eq!(Response::Deleted.serialize(), b"DELETED\r\n");
        assert_eq!(Response::NotFound.serialize(), b"NOT_FOUND\r\n");
        assert_eq!(Response::Ok.serialize(), b"OK\r\n");
        assert_eq!(Response::Error.serialize(), b"ERROR\r\n");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Response::ClientError("bad data chunk").serialize(),
            b"CLIENT_ERROR bad data chunk\r\n"
        );
        assert_eq!(
            Response::ServerError("object too large for cache").serialize(),
            b"SERVER_ERROR object too large for cache\r\n"
        );
    }

    #[test]
    fn test_values_serialization() {
        let response = Response::Values(vec![
            FoundValue {
                key: Bytes::from("name"),
                flags: 7,
                data: Bytes::from("Ariz"),
            },
            FoundValue {
                key: Bytes::from("bin"),
                flags: 0,
                data: Bytes::from(&b"a\r\nb"[..]),
            },
        ]);

        assert_eq!(
            response.serialize(),
            b"VALUE name 7 4\r\nAriz\r\nVALUE bin 0 4\r\na\r\nb\r\nEND\r\n"
        );
    }

    #[test]
    fn test_empty_values_is_just_end() {
        assert_eq!(Response::Values(vec![]).serialize(), b"END\r\n");
    }

    #[test]
    fn test_stats_serialization() {
        let response = Response::Stats(vec![("curr_items", 2), ("cmd_get", 10)]);
        assert_eq!(
            response.serialize(),
            b"STAT curr_items 2\r\nSTAT cmd_get 10\r\nEND\r\n"
        );
    }

    #[test]
    fn test_noreply_writes_nothing() {
        assert!(Response::NoReply.serialize().is_empty());
        assert!(Response::NoReply.is_empty());
    }

    #[test]
    fn test_verb_from_token() {
        assert_eq!(StorageVerb::from_token("set"), Some(StorageVerb::Set));
        assert_eq!(
            StorageVerb::from_token("prepend"),
            Some(StorageVerb::Prepend)
        );
        assert_eq!(StorageVerb::from_token("get"), None);
        assert_eq!(StorageVerb::from_token("SET"), None); // caller lowercases
    }
}
