//! Establishing a session: discover the targets over HTTP, then dial the
//! first one that advertises a stream endpoint.

use std::future::Future;

use transport::{CdpTransport, CodecError, WebSocketTransport};

use crate::discovery::{Discovery, Target};
use crate::error::{DebuggerError, Result};
use crate::remote::{ClientOptions, RemoteDebugger};

/// Opens the message stream to a target's endpoint address.
pub trait Dialer {
    type Transport: CdpTransport;

    fn dial(&self, url: &str) -> impl Future<Output = Result<Self::Transport, CodecError>> + Send;
}

/// Dials targets over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

impl Dialer for WebSocketDialer {
    type Transport = WebSocketTransport;

    fn dial(&self, url: &str) -> impl Future<Output = Result<Self::Transport, CodecError>> + Send {
        transport::connect_websocket(url)
    }
}

/// Connect to the browser whose discovery endpoint listens on `address`
/// (`host:port`).
///
/// # Example
///
/// ```ignore
/// let remote = debugger::connect("localhost:9222", ClientOptions::default()).await?;
/// let domains = remote.get_domains().await?;
/// ```
pub async fn connect(address: &str, options: ClientOptions) -> Result<RemoteDebugger> {
    connect_with(&Discovery::new(address), &WebSocketDialer, options).await
}

/// Connect using an explicit discovery client and dialer.
pub async fn connect_with<D: Dialer>(
    discovery: &Discovery,
    dialer: &D,
    options: ClientOptions,
) -> Result<RemoteDebugger> {
    let targets = discovery.tabs(None).await?;
    let url = stream_endpoint(&targets);
    if url.is_empty() {
        tracing::warn!(targets = targets.len(), "no target advertises a stream endpoint");
    }

    tracing::info!(url, "connecting to debugging target");
    let transport = dialer
        .dial(url)
        .await
        .map_err(|source| DebuggerError::Connect {
            url: url.to_string(),
            source,
        })?;

    Ok(RemoteDebugger::from_transport(transport, options))
}

/// The first non-empty stream endpoint, or the empty string if there is none.
fn stream_endpoint(targets: &[Target]) -> &str {
    targets
        .iter()
        .map(|t| t.web_socket_debugger_url.as_str())
        .find(|url| !url.is_empty())
        .unwrap_or_default()
}
