//! Error types for the transport layer.

use std::io;

/// Errors that can occur while framing, encoding or decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O error occurred while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A single message grew past the configured maximum before it was complete.
    #[error("message size {size} exceeds maximum allowed {max}")]
    MessageTooLarge {
        /// The number of bytes buffered so far.
        size: usize,
        /// The maximum allowed size.
        max: usize,
    },

    /// Failed to deserialize a complete unit as a protocol message.
    #[error("JSON deserialization failed: {0}")]
    JsonDeserialize(#[source] serde_json::Error),

    /// The unit was valid JSON but neither a reply nor a notification.
    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    /// Failed to serialize the outgoing message to JSON.
    #[error("JSON serialization failed: {0}")]
    JsonSerialize(#[source] serde_json::Error),

    /// The WebSocket layer reported an error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
