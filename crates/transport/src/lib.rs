//! Async Chrome DevTools Protocol transport layer using tokio.
//!
//! This crate provides the transport layer for a browser remote-debugging
//! session, handling framing, encoding and decoding of messages over async
//! byte streams.
//!
//! # Architecture
//!
//! The crate is designed around the tokio-util codec pattern:
//!
//! - [`CdpCodec`] cuts an inbound byte stream into complete JSON units and
//!   encodes outgoing call envelopes
//! - [`CdpReader`] wraps an `AsyncRead` to produce a `Stream` of [`Frame`]s
//! - [`CdpWriter`] wraps an `AsyncWrite` to provide a `Sink` for envelopes
//! - [`WebSocketTransport`] adapts a browser's WebSocket endpoint to the same
//!   reader/writer shape, framing each message on its own
//!
//! # Usage
//!
//! ```ignore
//! use futures::{SinkExt, StreamExt};
//! use transport::{Frame, InboundMessage, OutgoingMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut reader, mut writer) =
//!         transport::connect("ws://127.0.0.1:9222/devtools/page/ABC").await?;
//!
//!     writer.send(OutgoingMessage::new(0, "Page.enable", None)).await?;
//!
//!     while let Some(frame) = reader.next().await {
//!         if let Frame::Complete(unit) = frame? {
//!             match InboundMessage::from_slice(&unit)? {
//!                 InboundMessage::Reply(r) => { /* handle reply */ }
//!                 InboundMessage::Event(e) => { /* handle notification */ }
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Scope
//!
//! This crate intentionally handles only transport concerns:
//! - Encoding outgoing envelopes to the wire format
//! - Reassembling and decoding incoming units
//! - Providing split reader/writer for upstream multiplexing
//!
//! Call/reply correlation, event routing, and discovery belong in the
//! `debugger` crate.

mod codec;
mod error;
mod message;
mod reader;
mod transport;
mod websocket;
mod writer;

pub mod testing;

// Re-export main types
pub use codec::{CdpCodec, Frame};
pub use error::CodecError;
pub use message::{CallId, Event, InboundMessage, OutgoingMessage, RemoteError, Reply};
pub use reader::CdpReader;
pub use transport::{CdpTransport, split, split_with_codec};
pub use websocket::{MessageFrames, MessageWriter, WebSocketTransport};
pub use writer::CdpWriter;

/// Reader half of a WebSocket session.
pub type WebSocketReader = <WebSocketTransport as CdpTransport>::Read;

/// Writer half of a WebSocket session.
pub type WebSocketWriter = <WebSocketTransport as CdpTransport>::Write;

/// Connect to a debugging target's WebSocket endpoint and return a
/// reader/writer pair.
///
/// This is a convenience function for the common case of talking to a
/// browser directly.
///
/// # Example
///
/// ```ignore
/// let (reader, writer) = transport::connect("ws://127.0.0.1:9222/devtools/page/ABC").await?;
/// ```
pub async fn connect(url: &str) -> Result<(WebSocketReader, WebSocketWriter), CodecError> {
    let transport = websocket::connect(url).await?;
    Ok(split(transport))
}

/// Open a WebSocket transport without splitting it.
pub async fn connect_websocket(url: &str) -> Result<WebSocketTransport, CodecError> {
    websocket::connect(url).await
}
