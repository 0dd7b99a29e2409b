//! Tracking pending calls and matching replies
//!
//! Every call gets a fresh id and a single-use delivery slot. When the
//! dispatch loop sees a reply it looks the id up here and hands the reply
//! to whoever is waiting on the slot.

use std::collections::HashMap;

use tokio::sync::{Mutex, oneshot};
use transport::{CallId, Reply};

use crate::error::{DebuggerError, Result};

struct Inner {
    next_id: CallId,
    pending: HashMap<CallId, oneshot::Sender<Reply>>,
    closed: bool,
}

/// Registry of calls waiting for a reply
///
/// Id allocation and slot insertion happen under the same lock, so two
/// concurrent callers can never observe the same id.
pub(crate) struct PendingRequests {
    inner: Mutex<Inner>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                pending: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Allocate the next id and record a slot for its reply
    pub(crate) async fn register(&self) -> Result<(CallId, oneshot::Receiver<Reply>)> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(DebuggerError::StreamClosed);
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let (tx, rx) = oneshot::channel();
        inner.pending.insert(id, tx);
        Ok((id, rx))
    }

    /// Deliver a reply to its waiter
    ///
    /// Returns false if nobody was waiting for this id.
    pub(crate) async fn resolve(&self, reply: Reply) -> bool {
        let id = reply.id;
        let Some(tx) = self.inner.lock().await.pending.remove(&id) else {
            tracing::debug!(id, "no pending call for reply");
            return false;
        };

        if tx.send(reply).is_err() {
            tracing::debug!(id, "caller stopped waiting for reply");
            return false;
        }
        true
    }

    /// Forget a call without delivering anything
    pub(crate) async fn cancel(&self, id: CallId) -> bool {
        self.inner.lock().await.pending.remove(&id).is_some()
    }

    /// Refuse new calls and release every waiter
    ///
    /// Dropping the senders wakes each receiver with a closed error, which
    /// callers report as [`DebuggerError::StreamClosed`].
    pub(crate) async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        let released = inner.pending.len();
        inner.pending.clear();
        if released > 0 {
            tracing::debug!(released, "released pending calls");
        }
    }

    /// Number of calls still waiting for a reply
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn reply(id: CallId, result: Value) -> Reply {
        Reply {
            id,
            result,
            error: None,
        }
    }

    #[tokio::test]
    async fn ids_start_at_zero_and_increase() {
        let registry = PendingRequests::new();

        let (first, _rx0) = registry.register().await.unwrap();
        let (second, _rx1) = registry.register().await.unwrap();
        let (third, _rx2) = registry.register().await.unwrap();

        assert_eq!((first, second, third), (0, 1, 2));
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_gives_unique_ids() {
        let registry = Arc::new(PendingRequests::new());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let (id, rx) = registry.register().await.unwrap();
                    // keep the slot alive until the id is collected
                    (id, rx)
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let (id, _rx) = handle.await.unwrap();
            assert!(ids.insert(id), "id {id} handed out twice");
        }

        assert_eq!(ids, (0..64).collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn resolve_delivers_to_matching_slot() {
        let registry = PendingRequests::new();
        let (a, rx_a) = registry.register().await.unwrap();
        let (b, rx_b) = registry.register().await.unwrap();

        assert!(registry.resolve(reply(b, json!("second"))).await);
        assert!(registry.resolve(reply(a, json!("first"))).await);

        assert_eq!(rx_a.await.unwrap().result, json!("first"));
        assert_eq!(rx_b.await.unwrap().result, json!("second"));
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn unknown_and_repeated_ids_are_dropped() {
        let registry = PendingRequests::new();
        let (id, rx) = registry.register().await.unwrap();

        assert!(!registry.resolve(reply(99, json!(null))).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.resolve(reply(id, json!(1))).await);
        assert!(!registry.resolve(reply(id, json!(2))).await);

        assert_eq!(rx.await.unwrap().result, json!(1));
    }

    #[tokio::test]
    async fn cancel_removes_entry() {
        let registry = PendingRequests::new();
        let (id, _rx) = registry.register().await.unwrap();

        assert!(registry.cancel(id).await);
        assert!(!registry.cancel(id).await);
        assert!(!registry.resolve(reply(id, json!({}))).await);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn close_releases_waiters_and_refuses_new_calls() {
        let registry = PendingRequests::new();
        let (_, rx) = registry.register().await.unwrap();

        registry.close().await;

        assert!(rx.await.is_err());
        assert!(matches!(
            registry.register().await,
            Err(DebuggerError::StreamClosed)
        ));
    }
}
