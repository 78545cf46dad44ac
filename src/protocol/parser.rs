//! Incremental Text Protocol Decoder
//!
//! This module turns the byte stream of one connection into [`Frame`]s. The
//! protocol is line-oriented with one irregularity: storage commands declare
//! an exact payload length, and the payload is raw bytes that may contain CR,
//! LF, or anything else. The decoder therefore runs as a small state machine
//! with two framing modes plus two recovery modes:
//!
//! - **Line**: scan for CRLF, tokenize the command header
//! - **Body**: a storage header was seen; wait for exactly `<bytes>` payload
//!   bytes plus the trailing CRLF
//! - **Discard**: the declared payload is over a limit; eat it from the
//!   stream anyway so the next command starts on a clean frame boundary
//! - **SkipLine**: the payload was not followed by CRLF; resynchronize at the
//!   next LF
//!
//! ## How the Decoder Works
//!
//! `decode` consumes bytes from the caller's `BytesMut` and returns either:
//! - `Some(frame)` - a complete command (or a well-framed protocol error)
//! - `None` - need more data, the command is incomplete
//!
//! This design allows the caller to:
//! 1. Append incoming network data to a buffer
//! 2. Call `decode()` in a loop until it returns `None`
//! 3. Read more data and repeat
//!
//! Malformed input never kills the connection: every bad header or oversized
//! payload maps to a [`Frame::Invalid`] variant with a well-defined error
//! response.

use crate::protocol::types::{Frame, InvalidFrame, StorageCommand, StorageVerb, CRLF};
use crate::storage::{MAX_KEY_LEN, MAX_VALUE_SIZE};
use bytes::{Buf, Bytes, BytesMut};

/// A parsed storage header waiting for its payload block.
#[derive(Debug)]
struct PendingStorage {
    verb: StorageVerb,
    key: Bytes,
    flags: u32,
    exptime: i64,
    bytes: usize,
    noreply: bool,
}

#[derive(Debug, Default)]
enum DecodeState {
    /// Scanning for a CRLF-terminated command line
    #[default]
    Line,
    /// Waiting for a storage payload of a known exact length
    Body(PendingStorage),
    /// Draining a payload that exceeded a limit, CRLF included
    Discard { remaining: usize, frame: Frame },
    /// Dropping bytes until the next LF, then yielding the error frame
    SkipLine { frame: Frame },
}

/// What a parsed command line asks the decoder to do next.
enum LineOutcome {
    Emit(Frame),
    ReadBody(PendingStorage),
    Drain { remaining: usize, frame: Frame },
}

/// An incremental decoder for one connection's byte stream.
///
/// # Example
///
/// ```
/// use ferrocache::protocol::{CommandDecoder, Frame};
/// use bytes::BytesMut;
///
/// let mut decoder = CommandDecoder::new();
/// let mut buf = BytesMut::from(&b"get name\r\n"[..]);
///
/// match decoder.decode(&mut buf) {
///     Some(Frame::Get { keys }) => assert_eq!(keys.len(), 1),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, Default)]
pub struct CommandDecoder {
    state: DecodeState,
}

impl CommandDecoder {
    /// Creates a new decoder in line mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to decode one frame, consuming bytes from `src`.
    ///
    /// Returns `None` when more data is needed; the caller keeps appending
    /// to `src` and calls again. Bytes of incomplete *lines* stay in `src`;
    /// bytes of drained or skipped payloads are consumed eagerly so the
    /// buffer never has to hold an over-limit payload.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<Frame> {
        loop {
            match std::mem::take(&mut self.state) {
                DecodeState::Line => {
                    let line_end = find_crlf(src)?;
                    let line = src.split_to(line_end);
                    src.advance(2);

                    match parse_line(&line) {
                        LineOutcome::Emit(frame) => return Some(frame),
                        LineOutcome::ReadBody(pending) => {
                            self.state = DecodeState::Body(pending);
                        }
                        LineOutcome::Drain { remaining, frame } => {
                            self.state = DecodeState::Discard { remaining, frame };
                        }
                    }
                }
                DecodeState::Body(pending) => {
                    if src.len() < pending.bytes + 2 {
                        self.state = DecodeState::Body(pending);
                        return None;
                    }

                    let data = src.split_to(pending.bytes).freeze();
                    if &src[..2] == CRLF {
                        src.advance(2);
                        return Some(Frame::Storage(StorageCommand {
                            verb: pending.verb,
                            key: pending.key,
                            flags: pending.flags,
                            exptime: pending.exptime,
                            data,
                            noreply: pending.noreply,
                        }));
                    }

                    // declared length didn't match what the client sent;
                    // resync at the next line boundary
                    self.state = DecodeState::SkipLine {
                        frame: Frame::Invalid(InvalidFrame::BadDataChunk {
                            noreply: pending.noreply,
                        }),
                    };
                }
                DecodeState::Discard {
                    mut remaining,
                    frame,
                } => {
                    let n = remaining.min(src.len());
                    src.advance(n);
                    remaining -= n;

                    if remaining > 0 {
                        self.state = DecodeState::Discard { remaining, frame };
                        return None;
                    }
                    return Some(frame);
                }
                DecodeState::SkipLine { frame } => {
                    match src.iter().position(|&b| b == b'\n') {
                        Some(pos) => {
                            src.advance(pos + 1);
                            return Some(frame);
                        }
                        None => {
                            src.clear();
                            self.state = DecodeState::SkipLine { frame };
                            return None;
                        }
                    }
                }
            }
        }
    }
}

/// Finds the position of the first CRLF pair.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == CRLF)
}

/// Tokenizes one command line.
fn parse_line(line: &[u8]) -> LineOutcome {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text,
        Err(_) => return LineOutcome::Emit(Frame::Invalid(InvalidFrame::BadCommandLine)),
    };

    let mut tokens = text.split_ascii_whitespace();
    let verb = match tokens.next() {
        Some(verb) => verb.to_ascii_lowercase(),
        // blank line
        None => return LineOutcome::Emit(Frame::Invalid(InvalidFrame::BadCommandLine)),
    };

    if let Some(storage_verb) = StorageVerb::from_token(&verb) {
        return parse_storage_header(storage_verb, tokens);
    }

    let frame = match verb.as_str() {
        "get" => {
            let keys: Vec<Bytes> = tokens
                .map(|t| Bytes::copy_from_slice(t.as_bytes()))
                .collect();
            if keys.is_empty() {
                Frame::Invalid(InvalidFrame::BadCommandLine)
            } else if keys.iter().any(|k| k.len() > MAX_KEY_LEN) {
                Frame::Invalid(InvalidFrame::KeyTooLong { noreply: false })
            } else {
                Frame::Get { keys }
            }
        }
        "delete" => match tokens.next() {
            Some(key) if key.len() <= MAX_KEY_LEN => Frame::Delete {
                key: Bytes::copy_from_slice(key.as_bytes()),
            },
            Some(_) => Frame::Invalid(InvalidFrame::KeyTooLong { noreply: false }),
            None => Frame::Invalid(InvalidFrame::BadCommandLine),
        },
        "flush_all" => Frame::FlushAll,
        "stats" => Frame::Stats,
        "quit" => Frame::Quit,
        _ => Frame::Invalid(InvalidFrame::BadCommandLine),
    };

    LineOutcome::Emit(frame)
}

/// Parses `<verb> <key> <flags> <exptime> <bytes> [noreply]`.
fn parse_storage_header<'a>(
    verb: StorageVerb,
    mut tokens: impl Iterator<Item = &'a str>,
) -> LineOutcome {
    let (Some(key), Some(flags), Some(exptime), Some(bytes)) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return LineOutcome::Emit(Frame::Invalid(InvalidFrame::BadCommandLine));
    };
    let noreply = matches!(tokens.next(), Some("noreply"));

    let (Ok(flags), Ok(exptime), Ok(bytes)) = (
        flags.parse::<u32>(),
        exptime.parse::<i64>(),
        bytes.parse::<usize>(),
    ) else {
        // with a bad <bytes> field we cannot know the payload length, so the
        // stream may desync; the client gets a generic error either way
        return LineOutcome::Emit(Frame::Invalid(InvalidFrame::BadCommandLine));
    };

    if key.len() > MAX_KEY_LEN {
        return LineOutcome::Drain {
            remaining: bytes.saturating_add(2),
            frame: Frame::Invalid(InvalidFrame::KeyTooLong { noreply }),
        };
    }

    if bytes > MAX_VALUE_SIZE {
        return LineOutcome::Drain {
            remaining: bytes.saturating_add(2),
            frame: Frame::Invalid(InvalidFrame::ValueTooLarge { noreply }),
        };
    }

    LineOutcome::ReadBody(PendingStorage {
        verb,
        key: Bytes::copy_from_slice(key.as_bytes()),
        flags,
        exptime,
        bytes,
        noreply,
    })
}
