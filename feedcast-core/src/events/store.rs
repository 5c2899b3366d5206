//! The event store contract.
//!
//! An [`EventStore`] publishes typed domain events and hands them to
//! subscribers, either by invoking a handler for each message (push) or by
//! buffering them in an [`EventStream`] the caller drains (pull).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use super::codec::CodecError;
use super::types::DomainEvent;
use crate::broker::BrokerError;

/// Errors returned by [`EventStore`] operations.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The broker could not be reached when the store was built.
    #[error("event store connection failed: {0}")]
    Connection(#[source] BrokerError),

    /// The event could not be serialized.
    #[error("failed to encode event: {0}")]
    Encode(#[from] CodecError),

    #[error("failed to publish event: {0}")]
    Publish(#[source] BrokerError),

    #[error("failed to subscribe: {0}")]
    Subscribe(#[source] BrokerError),

    /// The store has been closed.
    #[error("event store is closed")]
    Closed,
}

/// Handles events delivered by a push subscription.
///
/// Events on one subscription are handled one at a time, in broker order.
/// Any `Fn(E) -> impl Future<Output = ()>` closure is a handler.
pub trait EventHandler<E>: Send + Sync + 'static {
    fn handle(&self, event: E) -> impl Future<Output = ()> + Send;
}

impl<E, F, Fut> EventHandler<E> for F
where
    E: Send + 'static,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    fn handle(&self, event: E) -> impl Future<Output = ()> + Send {
        self(event)
    }
}

/// A payload a subscription discarded because it could not be decoded.
#[derive(Debug)]
pub struct DroppedMessage<'a> {
    pub topic: &'static str,
    pub payload: &'a [u8],
    pub error: &'a CodecError,
}

/// Callback invoked for every dropped payload.
pub type DropObserver = Arc<dyn Fn(DroppedMessage<'_>) + Send + Sync>;

/// Receiving end of a pull subscription.
///
/// Yields events in the order the broker delivered them and ends once the
/// store is closed. Dropping the stream cancels the subscription.
pub struct EventStream<E> {
    inner: ReceiverStream<E>,
}

impl<E> EventStream<E> {
    pub(crate) fn new(rx: mpsc::Receiver<E>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Receive the next event, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<E> {
        self.inner.next().await
    }
}

impl<E> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

/// Publish/subscribe access to domain events.
///
/// Implementations are shared by reference between publishers and
/// subscribers, and every method may be called concurrently with the
/// others, `close` included.
pub trait EventStore: Send + Sync + 'static {
    /// Encode `event` and publish it on its kind's topic.
    ///
    /// Subscribers that join later never see it.
    fn publish<E: DomainEvent>(
        &self,
        event: &E,
    ) -> impl Future<Output = Result<(), EventStoreError>> + Send;

    /// Invoke `handler` once for every decodable `E` published from now on.
    ///
    /// Payloads that fail to decode are skipped without calling the handler.
    fn subscribe_push<E, H>(
        &self,
        handler: H,
    ) -> impl Future<Output = Result<(), EventStoreError>> + Send
    where
        E: DomainEvent,
        H: EventHandler<E>;

    /// Open a buffered stream of every decodable `E` published from now on.
    fn subscribe_pull<E: DomainEvent>(
        &self,
    ) -> impl Future<Output = Result<EventStream<E>, EventStoreError>> + Send;

    /// Stop every subscription and release the broker connection.
    ///
    /// Idempotent. Returns once every subscription has been torn down.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
