use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use transport::{CdpCodec, CdpTransport, CodecError, OutgoingMessage, Reply};

use crate::dispatch;
use crate::error::{DebuggerError, Result};
use crate::events::{EventReceiver, EventSubscribers};
use crate::pending_requests::PendingRequests;

/// How long a call waits for its reply unless told otherwise.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest inbound unit accepted before the connection is dropped (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

type BoxedWriter = Pin<Box<dyn Sink<OutgoingMessage, Error = CodecError> + Send>>;

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Deadline applied to every [`RemoteDebugger::call`]. `None` waits
    /// forever.
    pub call_timeout: Option<Duration>,
    /// Maximum size of a single inbound unit.
    pub max_message_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// A live connection to one debugging target.
///
/// Calls may be issued concurrently from any number of tasks (share it
/// through an [`Arc`] or by reference). Replies are matched to their calls
/// by id by a single background task that also feeds the event
/// subscribers.
pub struct RemoteDebugger {
    registry: Arc<PendingRequests>,
    subscribers: Arc<EventSubscribers>,
    writer: Mutex<Option<BoxedWriter>>,
    cancel_token: CancellationToken,
    dispatch_handle: Mutex<Option<JoinHandle<()>>>,
    call_timeout: Option<Duration>,
}

impl RemoteDebugger {
    /// Start a session over an already established transport
    ///
    /// Spawns the dispatch loop, so this must run inside a tokio runtime.
    pub fn from_transport<T: CdpTransport>(transport: T, options: ClientOptions) -> Self {
        let codec = CdpCodec::with_max_size(options.max_message_size);
        let (reader, writer) = transport::split_with_codec(transport, codec);

        let registry = Arc::new(PendingRequests::new());
        let subscribers = Arc::new(EventSubscribers::new());
        let cancel_token = CancellationToken::new();

        let dispatch_handle = dispatch::spawn(
            reader,
            Arc::clone(&registry),
            Arc::clone(&subscribers),
            cancel_token.clone(),
        );

        Self {
            registry,
            subscribers,
            writer: Mutex::new(Some(Box::pin(writer))),
            cancel_token,
            dispatch_handle: Mutex::new(Some(dispatch_handle)),
            call_timeout: options.call_timeout,
        }
    }

    /// Call a method and wait for its result, using the default deadline
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.call_with_timeout(method, params, self.call_timeout)
            .await
    }

    /// Call a method with an explicit deadline (`None` waits forever)
    #[tracing::instrument(skip(self, params))]
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        if self.cancel_token.is_cancelled() {
            return Err(DebuggerError::StreamClosed);
        }

        let (id, rx) = self.registry.register().await?;

        if let Err(e) = self.send(OutgoingMessage::new(id, method, params)).await {
            self.registry.cancel(id).await;
            return Err(e);
        }

        let reply = match timeout {
            Some(duration) => match tokio::time::timeout(duration, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.registry.cancel(id).await;
                    tracing::warn!(id, ?duration, "call timed out");
                    return Err(DebuggerError::Timeout {
                        method: method.to_string(),
                        duration,
                    });
                }
            },
            None => rx.await,
        }
        .map_err(|_| DebuggerError::StreamClosed)?;

        into_result(method, reply)
    }

    async fn send(&self, msg: OutgoingMessage) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(DebuggerError::StreamClosed)?;

        tracing::debug!(id = msg.id, method = %msg.method, params = %msg.params, "sending call");
        let method = msg.method.clone();
        writer
            .send(msg)
            .await
            .map_err(|source| DebuggerError::Send { method, source })
    }

    /// Subscribe to every notification the browser sends from now on
    ///
    /// The receiver buffers without limit: one that is kept alive but never
    /// drained holds every event of the session. Drop it when done, or use
    /// [`events_bounded`](Self::events_bounded).
    pub async fn events(&self) -> EventReceiver {
        self.subscribers.subscribe().await
    }

    /// Subscribe with room for at most `capacity` undelivered events
    ///
    /// While the receiver is full, new events are dropped for it (with a
    /// warning) and other subscribers are unaffected.
    pub async fn events_bounded(&self, capacity: usize) -> EventReceiver {
        self.subscribers.subscribe_bounded(capacity).await
    }

    /// Number of calls still waiting for a reply
    pub async fn pending_calls(&self) -> usize {
        self.registry.len().await
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Shut the connection down
    ///
    /// Stops the dispatch loop, closes the write half and releases every
    /// pending call with [`DebuggerError::StreamClosed`]. Calling it again
    /// does nothing.
    pub async fn close(&self) {
        self.cancel_token.cancel();

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close().await {
                tracing::debug!(error = %e, "error closing write half");
            }
        }

        let handle = self.dispatch_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "dispatch task failed");
            }
        }

        // the loop may never have run if the runtime is shutting down
        self.registry.close().await;
        self.subscribers.close().await;
    }
}

impl Drop for RemoteDebugger {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

fn into_result(method: &str, reply: Reply) -> Result<Value> {
    match reply.error {
        Some(error) => Err(DebuggerError::Remote {
            method: method.to_string(),
            code: error.code,
            message: error.message,
            data: error.data,
        }),
        None => Ok(reply.result),
    }
}
