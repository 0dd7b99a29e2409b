//! DevTools codec implementation using tokio-util.
//!
//! This module provides [`CdpCodec`], which implements both the `Encoder` and
//! `Decoder` traits from tokio-util for protocol messages.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::IgnoredAny;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::message::OutgoingMessage;

/// Default maximum message size (64 MB). Screenshots and DOM snapshots are large.
const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// One unit cut from the inbound byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The exact bytes of one complete top-level JSON value.
    Complete(Bytes),
    /// Bytes that can never become a JSON value. They have been dropped
    /// from the buffer so reading can carry on with whatever follows.
    Malformed {
        /// The discarded bytes.
        bytes: Bytes,
        /// Why they were rejected.
        reason: String,
    },
}

/// Codec for the DevTools message stream.
///
/// Each unit on the wire is a single JSON value with no header or length
/// prefix, and the underlying stream may deliver a unit in arbitrary
/// fragments or several units back to back. Decoding therefore runs an
/// incremental JSON scan over the buffered bytes and distinguishes three
/// outcomes:
///
/// - the buffer ends inside a value: wait for more bytes
/// - a complete value was found: cut exactly that span
/// - the bytes are not JSON: discard them up to the next `{` after the
///   error and report a malformed frame
///
/// # Example
///
/// ```ignore
/// use tokio_util::codec::FramedRead;
/// use transport::CdpCodec;
///
/// let framed = FramedRead::new(reader, CdpCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct CdpCodec {
    /// Maximum allowed message size in bytes.
    max_message_size: usize,
    progress: Progress,
}

impl CdpCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a new codec with a custom maximum message size.
    ///
    /// An incomplete unit growing past this will be rejected with
    /// [`CodecError::MessageTooLarge`].
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            progress: Progress::default(),
        }
    }

    fn incomplete(&self, src: &BytesMut) -> Result<Option<Frame>, CodecError> {
        if src.len() > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: src.len(),
                max: self.max_message_size,
            });
        }
        Ok(None)
    }
}

impl Default for CdpCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural progress through a buffered object or array.
///
/// Only tracks nesting and strings, so it can tell when the outermost
/// bracket may have closed without re-reading bytes it has already seen.
/// Validation is left to serde_json.
#[derive(Debug, Clone, Default)]
struct Progress {
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// Buffer length at the last full scan that came back incomplete.
    checked_len: usize,
}

impl Progress {
    /// Feed the bytes not seen yet. Returns true once the outermost
    /// bracket closes.
    fn advance(&mut self, buf: &[u8]) -> bool {
        while self.scanned < buf.len() {
            let b = buf[self.scanned];
            self.scanned += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }
}

enum Scan {
    Empty,
    Complete(usize),
    Incomplete,
    Malformed(serde_json::Error),
}

/// Scan the start of `buf` for one complete JSON value.
fn scan(buf: &[u8]) -> Scan {
    let mut values = serde_json::Deserializer::from_slice(buf).into_iter::<IgnoredAny>();
    match values.next() {
        None => Scan::Empty,
        Some(Ok(_)) => Scan::Complete(values.byte_offset()),
        Some(Err(e)) if e.is_eof() => Scan::Incomplete,
        Some(Err(e)) => Scan::Malformed(e),
    }
}

/// Where reading resumes after a syntax error: the first `{` at or after
/// the error position, never the very first byte.
fn resync_point(buf: &[u8], error: &serde_json::Error) -> usize {
    let line_start = match error.line() {
        0 | 1 => 0,
        line => buf
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .nth(line - 2)
            .map_or(buf.len(), |(i, _)| i + 1),
    };
    let at = (line_start + error.column().saturating_sub(1)).clamp(1, buf.len());

    buf[at..]
        .iter()
        .position(|b| *b == b'{')
        .map_or(buf.len(), |offset| at + offset)
}

impl Decoder for CdpCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Drop whitespace between units
        let Some(start) = src.iter().position(|b| !b.is_ascii_whitespace()) else {
            src.clear();
            self.progress = Progress::default();
            return Ok(None);
        };
        if start > 0 {
            src.advance(start);
            self.progress = Progress::default();
        }

        // Objects and arrays are only rescanned once they may have closed or
        // the buffer has doubled since the last look, so a unit trickling in
        // through many small reads is not parsed from the start every time.
        if matches!(src[0], b'{' | b'[') {
            let closed = self.progress.advance(src);
            if closed {
                self.progress.checked_len = 0;
            } else if src.len() < self.progress.checked_len.saturating_mul(2) {
                return self.incomplete(src);
            }
        }

        match scan(src) {
            Scan::Empty => Ok(None),
            Scan::Complete(end) => {
                self.progress = Progress::default();
                Ok(Some(Frame::Complete(src.split_to(end).freeze())))
            }
            Scan::Incomplete => {
                if self.progress.depth == 0 {
                    // the bracket count was fooled, start it over
                    self.progress = Progress::default();
                }
                self.progress.checked_len = src.len();
                self.incomplete(src)
            }
            Scan::Malformed(e) => {
                self.progress = Progress::default();
                let end = resync_point(src, &e);
                Ok(Some(Frame::Malformed {
                    bytes: src.split_to(end).freeze(),
                    reason: e.to_string(),
                }))
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => {
                self.progress = Progress::default();
                Ok(Some(Frame::Malformed {
                    bytes: buf.split().freeze(),
                    reason: "stream ended inside a message".to_string(),
                }))
            }
        }
    }
}

impl Encoder<OutgoingMessage> for CdpCodec {
    type Error = CodecError;

    fn encode(&mut self, item: OutgoingMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(CodecError::JsonSerialize)?;
        dst.reserve(json.len());
        dst.put_slice(&json);
        Ok(())
    }
}
