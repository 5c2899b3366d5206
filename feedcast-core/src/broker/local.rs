//! In-process broker.
//!
//! Mirrors the NATS transport's observable behaviour inside a single
//! process: per-topic fan-out to every current subscriber, no replay for
//! late subscribers, and per-subscriber buffers of
//! [`SUBSCRIPTION_BUFFER`](crate::events::channels::SUBSCRIPTION_BUFFER)
//! payloads. Unlike NATS it never drops messages for slow subscribers;
//! `publish` waits for buffer space instead.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Broker, BrokerError, BrokerSubscription};
use crate::events::channels::broker_channel;

type Subscribers = HashMap<&'static str, Vec<(u64, mpsc::Sender<Bytes>)>>;

/// In-process broker.
///
/// Cloning is cheap and shares the same topic table.
#[derive(Clone, Default)]
pub struct LocalBroker {
    inner: Arc<LocalBrokerInner>,
}

#[derive(Default)]
struct LocalBrokerInner {
    topics: Mutex<Subscribers>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl LocalBrokerInner {
    fn topics(&self) -> MutexGuard<'_, Subscribers> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, topic: &'static str, id: u64) {
        let mut topics = self.topics();
        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|(sub_id, _)| *sub_id != id);
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.topics().get(topic).map_or(0, Vec::len)
    }
}

impl Broker for LocalBroker {
    type Subscription = LocalSubscription;

    async fn publish(&self, topic: &'static str, payload: Bytes) -> Result<(), BrokerError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }

        // Snapshot the senders so the lock is not held across an await.
        let senders: Vec<mpsc::Sender<Bytes>> = self
            .inner
            .topics()
            .get(topic)
            .map(|subs| subs.iter().map(|(_, tx)| tx.clone()).collect())
            .unwrap_or_default();

        for tx in senders {
            // A closed receiver is a subscription being torn down.
            let _ = tx.send(payload.clone()).await;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &'static str) -> Result<LocalSubscription, BrokerError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = broker_channel();
        self.inner.topics().entry(topic).or_default().push((id, tx));
        debug!(%topic, id, "Local subscription opened");

        Ok(LocalSubscription {
            id,
            topic,
            rx,
            broker: Arc::downgrade(&self.inner),
        })
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        // Dropping every sender ends all open subscription streams.
        self.inner.topics().clear();
    }
}

/// A subscription on a [`LocalBroker`] topic.
///
/// Dropping it has the same effect as unsubscribing.
pub struct LocalSubscription {
    id: u64,
    topic: &'static str,
    rx: mpsc::Receiver<Bytes>,
    broker: Weak<LocalBrokerInner>,
}

impl LocalSubscription {
    fn detach(&mut self) {
        if let Some(broker) = self.broker.upgrade() {
            broker.remove(self.topic, self.id);
        }
        self.broker = Weak::new();
    }
}

impl Stream for LocalSubscription {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

impl BrokerSubscription for LocalSubscription {
    async fn unsubscribe(&mut self) -> Result<(), BrokerError> {
        self.detach();
        self.rx.close();
        Ok(())
    }
}

impl Drop for LocalSubscription {
    fn drop(&mut self) {
        self.detach();
    }
}
