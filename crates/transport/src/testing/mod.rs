//! Testing utilities for the transport layer.
//!
//! This module provides helpers for testing code that uses the DevTools
//! transport, including in-memory transports and wire encoding helpers.

mod memory;

pub use memory::MemoryTransport;

use serde::Serialize;

/// Encode a JSON-serializable message exactly as it travels on the wire.
///
/// This is useful for constructing test data that can be fed to a
/// [`CdpReader`](crate::CdpReader), whole or cut into pieces.
///
/// # Example
///
/// ```
/// use transport::testing::encode_message;
/// use serde_json::json;
///
/// let bytes = encode_message(&json!({"id": 0, "result": {}}));
///
/// assert_eq!(bytes, br#"{"id":0,"result":{}}"#);
/// ```
pub fn encode_message(msg: &impl Serialize) -> Vec<u8> {
    serde_json::to_vec(msg).expect("failed to serialize message")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_message() {
        let bytes = encode_message(&json!({"method": "Page.loadEventFired"}));
        let s = String::from_utf8(bytes).unwrap();

        assert_eq!(s, r#"{"method":"Page.loadEventFired"}"#);
    }
}
