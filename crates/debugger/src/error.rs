//! Errors surfaced to callers of the debugger API.

use std::time::Duration;

use serde_json::Value;
use transport::CodecError;

/// Everything that can go wrong while talking to a browser.
///
/// Undecodable inbound units never show up here: the dispatch loop logs
/// and skips them.
#[derive(Debug, thiserror::Error)]
pub enum DebuggerError {
    /// The HTTP discovery endpoint could not be reached, answered with a
    /// failure status, or returned a body that could not be decoded.
    #[error("discovery request to {url} failed")]
    Discovery {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The discovery endpoint did not answer within the startup window.
    #[error("discovery endpoint {address} not ready after {waited:?}")]
    NotReady { address: String, waited: Duration },

    /// Opening the message stream failed.
    #[error("connecting to {url} failed")]
    Connect {
        url: String,
        #[source]
        source: CodecError,
    },

    /// Writing a call envelope failed.
    #[error("sending {method} failed")]
    Send {
        method: String,
        #[source]
        source: CodecError,
    },

    /// No reply arrived before the call deadline.
    #[error("timeout waiting for reply to {method} after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// The browser rejected the call.
    #[error("{method} failed with code {code}: {message}")]
    Remote {
        method: String,
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The connection is closed, so no reply can ever arrive.
    #[error("connection closed")]
    StreamClosed,
}

pub type Result<T, E = DebuggerError> = std::result::Result<T, E>;
