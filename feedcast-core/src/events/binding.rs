//! Event store over a [`Broker`] transport.
//!
//! Each subscription is a forwarding task that reads the broker-native
//! subscription, decodes payloads and either calls a handler (push) or
//! forwards into a bounded channel (pull).
//!
//! Tasks stop on a shared `watch` shutdown signal, which is also observed
//! while a pull task is blocked on a full buffer, so `close` cannot wait on
//! a consumer that stopped reading. A task always unsubscribes before it
//! drops its end of the buffer.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channels::pull_channel;
use super::codec;
use super::store::{
    DropObserver, DroppedMessage, EventHandler, EventStore, EventStoreError, EventStream,
};
use super::types::DomainEvent;
use crate::broker::{Broker, BrokerSubscription, NatsBroker};

/// [`EventStore`] implementation backed by a [`Broker`].
pub struct BrokerEventStore<B: Broker> {
    broker: Arc<B>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    drop_observer: Option<DropObserver>,
}

impl BrokerEventStore<NatsBroker> {
    /// Connect to NATS at `url` and build a store on top of it.
    pub async fn connect(url: &str) -> Result<Self, EventStoreError> {
        let broker = NatsBroker::connect(url)
            .await
            .map_err(EventStoreError::Connection)?;
        Ok(Self::new(broker))
    }
}

impl<B: Broker> BrokerEventStore<B> {
    pub fn new(broker: B) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            broker: Arc::new(broker),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            drop_observer: None,
        }
    }

    /// Report every payload a subscription drops to `observer`.
    pub fn with_drop_observer(mut self, observer: DropObserver) -> Self {
        self.drop_observer = Some(observer);
        self
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Open a broker subscription for `E` and spawn `forward` over it.
    ///
    /// The closed check and the registration of the task happen under the
    /// task lock, so `close` either rejects the subscription or awaits it.
    async fn spawn_forwarder<E, F, Fut>(&self, forward: F) -> Result<(), EventStoreError>
    where
        E: DomainEvent,
        F: FnOnce(B::Subscription, Forwarding) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(EventStoreError::Closed);
        }

        let topic = E::KIND.topic();
        let mut subscription = self
            .broker
            .subscribe(topic)
            .await
            .map_err(EventStoreError::Subscribe)?;

        let mut tasks = self.tasks.lock().await;
        if self.is_closed() {
            drop(tasks);
            if let Err(e) = subscription.unsubscribe().await {
                debug!(%topic, error = %e, "Unsubscribe after close failed");
            }
            return Err(EventStoreError::Closed);
        }

        let ctx = Forwarding {
            topic,
            shutdown_rx: self.shutdown_tx.subscribe(),
            drop_observer: self.drop_observer.clone(),
        };
        tasks.push(tokio::spawn(forward(subscription, ctx)));
        debug!(%topic, "Subscription registered");
        Ok(())
    }
}

impl<B: Broker> EventStore for BrokerEventStore<B> {
    async fn publish<E: DomainEvent>(&self, event: &E) -> Result<(), EventStoreError> {
        if self.is_closed() {
            return Err(EventStoreError::Closed);
        }
        let payload = codec::encode(event)?;
        self.broker
            .publish(E::KIND.topic(), payload)
            .await
            .map_err(EventStoreError::Publish)
    }

    async fn subscribe_push<E, H>(&self, handler: H) -> Result<(), EventStoreError>
    where
        E: DomainEvent,
        H: EventHandler<E>,
    {
        self.spawn_forwarder::<E, _, _>(move |subscription, ctx| {
            ctx.run_push::<E, _, _>(subscription, handler)
        })
        .await
    }

    async fn subscribe_pull<E: DomainEvent>(&self) -> Result<EventStream<E>, EventStoreError> {
        let (tx, rx) = pull_channel::<E>();
        self.spawn_forwarder::<E, _, _>(move |subscription, ctx| {
            ctx.run_pull::<E, _>(subscription, tx)
        })
        .await?;
        Ok(EventStream::new(rx))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Closing event store");

        self.shutdown_tx.send_replace(true);

        let handles = std::mem::take(&mut *self.tasks.lock().await);
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Subscription task failed");
            }
        }
        debug!(count, "All subscription tasks stopped");

        self.broker.close().await;
        info!("Event store closed");
    }
}

/// Per-task state shared by the push and pull loops.
struct Forwarding {
    topic: &'static str,
    shutdown_rx: watch::Receiver<bool>,
    drop_observer: Option<DropObserver>,
}

impl Forwarding {
    /// Whether shutdown was requested before this task started.
    ///
    /// Receivers created after the signal never see a change, so the current
    /// value has to be inspected once up front.
    fn stopped(&mut self) -> bool {
        *self.shutdown_rx.borrow_and_update()
    }

    fn decode<E: DomainEvent>(&self, payload: &[u8]) -> Option<E> {
        match codec::decode::<E>(payload) {
            Ok(event) => Some(event),
            Err(error) => {
                debug!(topic = self.topic, error = %error, "Dropping undecodable payload");
                if let Some(observer) = &self.drop_observer {
                    observer(DroppedMessage {
                        topic: self.topic,
                        payload,
                        error: &error,
                    });
                }
                None
            }
        }
    }

    async fn run_push<E, H, S>(mut self, mut subscription: S, handler: H)
    where
        E: DomainEvent,
        H: EventHandler<E>,
        S: BrokerSubscription,
    {
        debug!(topic = self.topic, "Push subscription started");
        if !self.stopped() {
            loop {
                tokio::select! {
                    biased;

                    _ = self.shutdown_rx.changed() => break,

                    payload = subscription.next() => {
                        let Some(payload) = payload else {
                            debug!(topic = self.topic, "Broker subscription ended");
                            break;
                        };
                        let Some(event) = self.decode::<E>(&payload) else {
                            continue;
                        };
                        tokio::select! {
                            biased;
                            _ = self.shutdown_rx.changed() => break,
                            _ = handler.handle(event) => {}
                        }
                    }
                }
            }
        }
        self.finish(subscription).await;
    }

    async fn run_pull<E, S>(mut self, mut subscription: S, tx: mpsc::Sender<E>)
    where
        E: DomainEvent,
        S: BrokerSubscription,
    {
        debug!(topic = self.topic, "Pull subscription started");
        if !self.stopped() {
            loop {
                tokio::select! {
                    biased;

                    _ = self.shutdown_rx.changed() => break,

                    _ = tx.closed() => {
                        debug!(topic = self.topic, "Event stream dropped by consumer");
                        break;
                    }

                    payload = subscription.next() => {
                        let Some(payload) = payload else {
                            debug!(topic = self.topic, "Broker subscription ended");
                            break;
                        };
                        let Some(event) = self.decode::<E>(&payload) else {
                            continue;
                        };
                        // Blocks while the buffer is full.
                        tokio::select! {
                            biased;
                            _ = self.shutdown_rx.changed() => break,
                            sent = tx.send(event) => {
                                if sent.is_err() {
                                    debug!(topic = self.topic, "Event stream dropped by consumer");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }
        self.finish(subscription).await;
        drop(tx);
    }

    async fn finish<S: BrokerSubscription>(self, mut subscription: S) {
        if let Err(e) = subscription.unsubscribe().await {
            warn!(topic = self.topic, error = %e, "Failed to unsubscribe");
        }
        debug!(topic = self.topic, "Subscription stopped");
    }
}
