//! Browser remote debugging client
//!
//! Finds the debuggable targets of a browser over its HTTP discovery
//! endpoint, opens one message stream to a target and multiplexes calls and
//! notifications over it.
mod commands;
mod connect;
mod discovery;
mod dispatch;
mod error;
mod events;
mod pending_requests;
mod remote;

pub mod testing;

pub use connect::{Dialer, WebSocketDialer, connect, connect_with};
pub use discovery::{Discovery, Target, Version};
pub use error::{DebuggerError, Result};
pub use events::EventReceiver;
pub use remote::{ClientOptions, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE, RemoteDebugger};

// Wire types callers see in results and events
pub use transport::{Event, RemoteError};
