//! Testing utilities for the remote debugger.
//!
//! This module provides a scripted browser that sits on the other end of an
//! in-memory transport, plus a dialer that records which endpoint it was
//! asked to open.

use std::collections::VecDeque;
use std::future::Future;

use futures::StreamExt;
use serde_json::{Value, json};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};
use transport::testing::MemoryTransport;
use transport::{CdpReader, CodecError, Frame, OutgoingMessage};

use crate::connect::Dialer;
use crate::remote::{ClientOptions, RemoteDebugger};

/// How long [`MockBrowser::expect_call`] waits before giving up.
const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A fake browser for testing.
///
/// `MockBrowser` reads the call envelopes the client sends and writes raw
/// bytes back, so tests decide exactly how replies and events are chunked
/// on the wire.
pub struct MockBrowser {
    reader: Mutex<CdpReader<DuplexStream>>,
    writer: Mutex<Option<DuplexStream>>,
}

impl MockBrowser {
    /// Take the browser side of an in-memory transport pair.
    pub fn new(transport: MemoryTransport) -> Self {
        let (read, write) = transport.into_inner();
        Self {
            reader: Mutex::new(CdpReader::new(read)),
            writer: Mutex::new(Some(write)),
        }
    }

    /// Wait for the next call envelope, `None` once the client hung up.
    pub async fn recv(&self) -> Option<OutgoingMessage> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await? {
                Ok(Frame::Complete(unit)) => match serde_json::from_slice(&unit) {
                    Ok(msg) => return Some(msg),
                    Err(e) => tracing::warn!(error = %e, "client sent something that is not a call"),
                },
                Ok(Frame::Malformed { reason, .. }) => {
                    tracing::warn!(%reason, "client sent malformed data");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "mock browser read failed");
                    return None;
                }
            }
        }
    }

    /// Wait for a call to `method`, skipping any other calls.
    ///
    /// Panics if it does not arrive within a few seconds.
    pub async fn expect_call(&self, method: &str) -> OutgoingMessage {
        let result = timeout(EXPECT_TIMEOUT, async {
            while let Some(msg) = self.recv().await {
                if msg.method == method {
                    return Some(msg);
                }
                tracing::debug!(?msg, "received unexpected call while waiting for '{method}'");
            }
            None
        })
        .await;

        match result {
            Ok(Some(msg)) => msg,
            Ok(None) => panic!("connection closed while waiting for '{method}' call"),
            Err(_) => panic!("timeout waiting for '{method}' call"),
        }
    }

    /// Write bytes to the client exactly as given.
    pub async fn send_raw(&self, bytes: &[u8]) {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().expect("mock browser already hung up");
        writer.write_all(bytes).await.expect("failed to write to client");
        writer.flush().await.expect("failed to flush to client");
    }

    /// Write bytes to the client in pieces of `chunk_size`, yielding in
    /// between so the client sees each piece separately.
    pub async fn send_chunked(&self, bytes: &[u8], chunk_size: usize) {
        for chunk in bytes.chunks(chunk_size) {
            self.send_raw(chunk).await;
            tokio::task::yield_now().await;
        }
    }

    /// Send a successful reply.
    pub async fn reply(&self, id: u64, result: Value) {
        self.send_json(&json!({"id": id, "result": result})).await;
    }

    /// Send an error reply.
    pub async fn reply_error(&self, id: u64, code: i64, message: &str) {
        self.send_json(&json!({"id": id, "error": {"code": code, "message": message}}))
            .await;
    }

    /// Send a notification.
    pub async fn send_event(&self, method: &str, params: Value) {
        self.send_json(&json!({"method": method, "params": params}))
            .await;
    }

    async fn send_json(&self, value: &Value) {
        self.send_raw(&transport::testing::encode_message(value))
            .await;
    }

    /// Close the browser's side of the stream.
    pub async fn hang_up(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}

/// A client connected to a [`MockBrowser`] over an in-memory transport.
pub fn connected_pair(options: ClientOptions) -> (RemoteDebugger, MockBrowser) {
    let (client, browser) = MemoryTransport::pair();
    (
        RemoteDebugger::from_transport(client, options),
        MockBrowser::new(browser),
    )
}

/// A dialer that records every address it is asked for and hands out
/// in-memory transports.
#[derive(Default)]
pub struct RecordingDialer {
    dialed: Mutex<Vec<String>>,
    browsers: Mutex<VecDeque<MockBrowser>>,
}

impl RecordingDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every address dialed so far, in order.
    pub async fn dialed(&self) -> Vec<String> {
        self.dialed.lock().await.clone()
    }

    /// Browser side of the oldest connection not yet taken.
    pub async fn take_browser(&self) -> Option<MockBrowser> {
        self.browsers.lock().await.pop_front()
    }
}

impl Dialer for RecordingDialer {
    type Transport = MemoryTransport;

    fn dial(&self, url: &str) -> impl Future<Output = Result<Self::Transport, CodecError>> + Send {
        let url = url.to_string();
        async move {
            self.dialed.lock().await.push(url);
            let (client, browser) = MemoryTransport::pair();
            self.browsers.lock().await.push_back(MockBrowser::new(browser));
            Ok(client)
        }
    }
}
