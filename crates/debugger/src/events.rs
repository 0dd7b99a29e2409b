use futures::future::Either;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use transport::Event;

enum Feed {
    Unbounded(mpsc::UnboundedReceiver<Event>),
    Bounded(mpsc::Receiver<Event>),
}

/// Async event receiver that wraps tokio mpsc
///
/// The feed ends (`recv` returns `None`) once the connection is closed.
pub struct EventReceiver {
    feed: Feed,
}

impl EventReceiver {
    /// Receive next event asynchronously
    pub async fn recv(&mut self) -> Option<Event> {
        match &mut self.feed {
            Feed::Unbounded(rx) => rx.recv().await,
            Feed::Bounded(rx) => rx.recv().await,
        }
    }

    /// Skip events until one with the given method arrives
    pub async fn wait_for(&mut self, method: &str) -> Option<Event> {
        while let Some(event) = self.recv().await {
            if event.method == method {
                return Some(event);
            }
            tracing::trace!(method = %event.method, "skipping event");
        }
        None
    }

    /// Convert to a Stream for use with StreamExt
    pub fn into_stream(self) -> impl futures::Stream<Item = Event> {
        match self.feed {
            Feed::Unbounded(rx) => Either::Left(UnboundedReceiverStream::new(rx)),
            Feed::Bounded(rx) => Either::Right(ReceiverStream::new(rx)),
        }
    }
}

enum Subscriber {
    Unbounded(mpsc::UnboundedSender<Event>),
    Bounded(mpsc::Sender<Event>),
}

impl Subscriber {
    /// Hand over one event. False once the receiver is gone.
    fn deliver(&self, event: &Event) -> bool {
        match self {
            Subscriber::Unbounded(tx) => tx.send(event.clone()).is_ok(),
            Subscriber::Bounded(tx) => match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(event)) => {
                    tracing::warn!(method = %event.method, "event receiver is full, dropping event");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
        }
    }
}

/// Fan-out of notifications to every live receiver
pub(crate) struct EventSubscribers {
    senders: Mutex<Option<Vec<Subscriber>>>,
}

impl EventSubscribers {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(Some(Vec::new())),
        }
    }

    pub(crate) async fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add(Subscriber::Unbounded(tx)).await;
        EventReceiver {
            feed: Feed::Unbounded(rx),
        }
    }

    /// Subscribe with room for at most `capacity` undelivered events.
    /// Events arriving while it is full are dropped for this receiver only.
    pub(crate) async fn subscribe_bounded(&self, capacity: usize) -> EventReceiver {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.add(Subscriber::Bounded(tx)).await;
        EventReceiver {
            feed: Feed::Bounded(rx),
        }
    }

    async fn add(&self, subscriber: Subscriber) {
        // once closed the sender is dropped here and the receiver ends immediately
        if let Some(senders) = self.senders.lock().await.as_mut() {
            senders.push(subscriber);
        }
    }

    /// Send an event to every subscriber, forgetting the ones that went away
    pub(crate) async fn publish(&self, event: Event) {
        let mut guard = self.senders.lock().await;
        let Some(senders) = guard.as_mut() else {
            return;
        };
        senders.retain(|subscriber| subscriber.deliver(&event));
    }

    /// End every feed
    pub(crate) async fn close(&self) {
        self.senders.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn event(method: &str) -> Event {
        Event {
            method: method.to_string(),
            params: json!({}),
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let subscribers = EventSubscribers::new();
        let mut a = subscribers.subscribe().await;
        let mut b = subscribers.subscribe().await;

        subscribers.publish(event("Page.loadEventFired")).await;

        assert_eq!(a.recv().await.unwrap().method, "Page.loadEventFired");
        assert_eq!(b.recv().await.unwrap().method, "Page.loadEventFired");
    }

    #[tokio::test]
    async fn dropped_receivers_are_forgotten() {
        let subscribers = EventSubscribers::new();
        let dropped = subscribers.subscribe().await;
        let dropped_bounded = subscribers.subscribe_bounded(4).await;
        let mut kept = subscribers.subscribe().await;
        drop(dropped);
        drop(dropped_bounded);

        subscribers.publish(event("DOM.documentUpdated")).await;

        assert_eq!(kept.recv().await.unwrap().method, "DOM.documentUpdated");
        assert_eq!(subscribers.senders.lock().await.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn full_bounded_receiver_drops_newest_events() {
        let subscribers = EventSubscribers::new();
        let bounded = subscribers.subscribe_bounded(2).await;
        let unbounded = subscribers.subscribe().await;

        for i in 0..5 {
            subscribers.publish(event(&format!("Network.dataReceived{i}"))).await;
        }
        subscribers.close().await;

        let kept: Vec<_> = bounded.into_stream().map(|e| e.method).collect().await;
        assert_eq!(kept, ["Network.dataReceived0", "Network.dataReceived1"]);
        assert_eq!(unbounded.into_stream().count().await, 5);
    }

    #[tokio::test]
    async fn close_ends_feeds() {
        let subscribers = EventSubscribers::new();
        let existing = subscribers.subscribe().await;

        subscribers.close().await;
        let mut late = subscribers.subscribe().await;
        let mut late_bounded = subscribers.subscribe_bounded(1).await;

        assert!(late.recv().await.is_none());
        assert!(late_bounded.recv().await.is_none());
        assert_eq!(existing.into_stream().collect::<Vec<_>>().await, vec![]);
    }

    #[tokio::test]
    async fn wait_for_skips_other_methods() {
        let subscribers = EventSubscribers::new();
        let mut rx = subscribers.subscribe().await;

        subscribers.publish(event("Network.requestWillBeSent")).await;
        subscribers.publish(event("Page.frameNavigated")).await;
        subscribers.publish(event("Page.loadEventFired")).await;
        subscribers.close().await;

        let found = rx.wait_for("Page.frameNavigated").await.unwrap();
        assert_eq!(found.method, "Page.frameNavigated");
        assert!(rx.wait_for("Runtime.consoleAPICalled").await.is_none());
    }
}
