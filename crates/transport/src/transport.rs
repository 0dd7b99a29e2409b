//! Transport abstraction and split functionality.
//!
//! This module provides the [`CdpTransport`] trait for abstracting over
//! the streams a DevTools session can run on, and the [`split`] function for
//! creating reader/writer pairs.

use futures::{Sink, Stream};

use crate::codec::{CdpCodec, Frame};
use crate::error::CodecError;
use crate::message::OutgoingMessage;

/// A transport that can be split into a stream of inbound frames and an
/// outbound envelope sink.
///
/// The codec is handed to the transport because only the transport knows
/// where units may begin: a byte stream frames its whole input with it
/// (see [`CdpReader`](crate::CdpReader)), while a message-oriented
/// transport (WebSocket) frames every message on its own so that a
/// truncated message cannot swallow the ones after it. The write side is a
/// sink of whole envelopes for the same reason.
///
/// # Example
///
/// ```ignore
/// use transport::{split, CdpTransport};
///
/// let transport = transport::connect_websocket("ws://127.0.0.1:9222/devtools/page/ABC").await?;
/// let (frames, writer) = split(transport);
/// ```
pub trait CdpTransport: Send + 'static {
    /// The read half type.
    type Read: Stream<Item = Result<Frame, CodecError>> + Unpin + Send + 'static;
    /// The write half type.
    type Write: Sink<OutgoingMessage, Error = CodecError> + Unpin + Send + 'static;

    /// Split the transport into separate read and write halves, framing
    /// the read side with `codec`.
    fn into_split(self, codec: CdpCodec) -> (Self::Read, Self::Write);
}

/// Split a transport into a reader and writer pair.
///
/// This is the primary entry point for using the transport layer.
/// The returned halves can be used independently and concurrently,
/// allowing upstream code to own the read side in a single task.
pub fn split<T: CdpTransport>(transport: T) -> (T::Read, T::Write) {
    split_with_codec(transport, CdpCodec::new())
}

/// Split a transport, framing the read side with a custom codec.
pub fn split_with_codec<T: CdpTransport>(transport: T, codec: CdpCodec) -> (T::Read, T::Write) {
    transport.into_split(codec)
}
