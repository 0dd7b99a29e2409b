//! The single reader of the inbound stream.
//!
//! Replies go to the registry, notifications go to every event subscriber.
//! When the loop ends, for whatever reason, both are closed so that nobody
//! waits on a connection that can no longer answer.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use transport::{CodecError, Frame, InboundMessage};

use crate::events::EventSubscribers;
use crate::pending_requests::PendingRequests;

/// Spawn the dispatch loop for one connection
pub(crate) fn spawn<R>(
    reader: R,
    registry: Arc<PendingRequests>,
    subscribers: Arc<EventSubscribers>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: Stream<Item = Result<Frame, CodecError>> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        run(reader, &registry, &subscribers, cancel).await;

        registry.close().await;
        subscribers.close().await;
    })
}

async fn run<R>(
    mut reader: R,
    registry: &PendingRequests,
    subscribers: &EventSubscribers,
    cancel: CancellationToken,
) where
    R: Stream<Item = Result<Frame, CodecError>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("dispatch loop cancelled");
                break;
            }
            frame = reader.next() => {
                match frame {
                    Some(Ok(Frame::Complete(unit))) => route(&unit, registry, subscribers).await,
                    Some(Ok(Frame::Malformed { bytes, reason })) => {
                        tracing::warn!(
                            len = bytes.len(),
                            %reason,
                            data = %String::from_utf8_lossy(&bytes),
                            "discarding malformed data"
                        );
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "transport error");
                        break;
                    }
                    None => {
                        tracing::debug!("stream closed by browser");
                        break;
                    }
                }
            }
        }
    }
}

async fn route(unit: &[u8], registry: &PendingRequests, subscribers: &EventSubscribers) {
    match InboundMessage::from_slice(unit) {
        Ok(InboundMessage::Reply(reply)) => {
            tracing::debug!(id = reply.id, "received reply");
            registry.resolve(reply).await;
        }
        Ok(InboundMessage::Event(event)) => {
            tracing::debug!(method = %event.method, params = %event.params, "EVENT");
            subscribers.publish(event).await;
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                unit = %String::from_utf8_lossy(unit),
                "failed to decode message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio::time::{Duration, timeout};
    use transport::{CdpCodec, CdpReader};

    struct Harness {
        registry: Arc<PendingRequests>,
        subscribers: Arc<EventSubscribers>,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
        browser: tokio::io::DuplexStream,
    }

    fn harness() -> Harness {
        harness_with_codec(CdpCodec::new())
    }

    fn harness_with_codec(codec: CdpCodec) -> Harness {
        let (browser, client) = tokio::io::duplex(1024);
        let registry = Arc::new(PendingRequests::new());
        let subscribers = Arc::new(EventSubscribers::new());
        let cancel = CancellationToken::new();
        let handle = spawn(
            CdpReader::with_codec(client, codec),
            Arc::clone(&registry),
            Arc::clone(&subscribers),
            cancel.clone(),
        );
        Harness {
            registry,
            subscribers,
            cancel,
            handle,
            browser,
        }
    }

    #[tokio::test]
    async fn reply_resolves_matching_call() {
        let mut h = harness();
        let (id, rx) = h.registry.register().await.unwrap();
        let (_other, mut other_rx) = h.registry.register().await.unwrap();

        h.browser
            .write_all(br#"{"id":0,"result":{"frameId":"F1"}}"#)
            .await
            .unwrap();

        let reply = rx.await.unwrap();
        assert_eq!(reply.id, id);
        assert_eq!(reply.result, json!({"frameId": "F1"}));
        assert!(other_rx.try_recv().is_err());
        assert_eq!(h.registry.len().await, 1);
    }

    #[tokio::test]
    async fn event_goes_to_subscribers_not_registry() {
        let mut h = harness();
        let mut events = h.subscribers.subscribe().await;
        let (_, mut rx) = h.registry.register().await.unwrap();

        h.browser
            .write_all(br#"{"method":"Page.loadEventFired","params":{"timestamp":12.5}}"#)
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.method, "Page.loadEventFired");
        assert_eq!(event.params["timestamp"], json!(12.5));
        assert!(rx.try_recv().is_err());
        assert_eq!(h.registry.len().await, 1);
    }

    #[tokio::test]
    async fn reply_never_reaches_event_feed() {
        let mut h = harness();
        let mut events = h.subscribers.subscribe().await;
        let (_, rx) = h.registry.register().await.unwrap();

        h.browser
            .write_all(br#"{"id":0,"result":{}}{"method":"DOM.documentUpdated","params":{}}"#)
            .await
            .unwrap();

        rx.await.unwrap();
        assert_eq!(events.recv().await.unwrap().method, "DOM.documentUpdated");

        drop(h.browser);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn undecodable_units_are_skipped() {
        let mut h = harness();
        let (_, rx) = h.registry.register().await.unwrap();

        h.browser
            .write_all(br#"[1,2,3] {"params":{}} "just a string" {"id":0,"result":{"ok":true}}"#)
            .await
            .unwrap();

        assert_eq!(rx.await.unwrap().result, json!({"ok": true}));
        assert!(!h.handle.is_finished());
    }

    #[tokio::test]
    async fn malformed_bytes_do_not_stop_the_loop() {
        let mut h = harness();

        h.browser.write_all(b"}}garbage").await.unwrap();
        // let the loop drop the bad bytes before the next unit lands
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (_, rx) = h.registry.register().await.unwrap();
        h.browser.write_all(br#"{"id":0,"result":{}}"#).await.unwrap();

        assert_eq!(rx.await.unwrap().result, json!({}));
    }

    #[tokio::test]
    async fn reply_after_garbage_in_same_chunk_is_routed() {
        let mut h = harness();
        let (_, rx) = h.registry.register().await.unwrap();

        h.browser
            .write_all(br#"}{"id":0,"result":{"ok":true}}"#)
            .await
            .unwrap();

        let reply = timeout(Duration::from_millis(500), rx).await.unwrap().unwrap();
        assert_eq!(reply.result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn reply_after_broken_unit_is_routed() {
        let mut h = harness();
        let (_, rx) = h.registry.register().await.unwrap();

        h.browser.write_all(br#"{"id":1,"result":tru"#).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.browser
            .write_all(br#"e,}{"id":0,"result":{"ok":true}}"#)
            .await
            .unwrap();

        let reply = timeout(Duration::from_millis(500), rx).await.unwrap().unwrap();
        assert_eq!(reply.result, json!({"ok": true}));
        assert!(!h.handle.is_finished());
    }

    #[tokio::test]
    async fn fragmented_reply_is_reassembled() {
        let mut h = harness();
        let (_, rx) = h.registry.register().await.unwrap();
        let unit = br#"{"id":0,"result":{"nested":{"s":"a } b"}}}"#;

        for byte in unit.iter() {
            h.browser.write_all(&[*byte]).await.unwrap();
            tokio::task::yield_now().await;
        }

        assert_eq!(rx.await.unwrap().result, json!({"nested": {"s": "a } b"}}));
    }

    #[tokio::test]
    async fn end_of_stream_releases_pending_calls() {
        let h = harness();
        let (_, rx) = h.registry.register().await.unwrap();

        drop(h.browser);

        h.handle.await.unwrap();
        assert!(rx.await.is_err());
        assert!(h.registry.register().await.is_err());
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let h = harness();
        let (_, rx) = h.registry.register().await.unwrap();

        h.cancel.cancel();

        h.handle.await.unwrap();
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn oversized_unit_is_fatal() {
        let mut h = harness_with_codec(CdpCodec::with_max_size(16));
        let (_, rx) = h.registry.register().await.unwrap();

        h.browser
            .write_all(br#"{"id":0,"result":{"padding":"0123456789abcdef"#)
            .await
            .unwrap();

        h.handle.await.unwrap();
        assert!(rx.await.is_err());
    }
}
