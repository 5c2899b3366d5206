//! Publish/subscribe broker transports.
//!
//! A [`Broker`] moves opaque payloads between topics and subscribers. It
//! knows nothing about event types or encoding; that is layered on top by
//! [`BrokerEventStore`](crate::events::BrokerEventStore).
//!
//! Implementations:
//! - [`NatsBroker`]: NATS core pub/sub via `async-nats`
//! - [`LocalBroker`]: in-process broker for tests and single-process runs

use std::future::Future;

use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;

pub mod local;
pub mod nats;

pub use local::{LocalBroker, LocalSubscription};
pub use nats::{NatsBroker, NatsSubscription};

/// Errors reported by a broker transport.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("unsubscribe failed: {0}")]
    Unsubscribe(String),

    #[error("broker connection is closed")]
    Closed,
}

/// A broker-native subscription: a stream of raw payloads on one topic.
///
/// The stream ends when the broker connection goes away.
pub trait BrokerSubscription: Stream<Item = Bytes> + Send + Unpin + 'static {
    /// Stop delivery on this subscription.
    fn unsubscribe(&mut self) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// A publish/subscribe transport.
///
/// Handles are shared by reference across publishers; implementations must
/// allow concurrent `publish` and `subscribe` calls.
pub trait Broker: Send + Sync + 'static {
    type Subscription: BrokerSubscription;

    /// Send `payload` to every current subscriber of `topic`.
    fn publish(
        &self,
        topic: &'static str,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Open a subscription on `topic`.
    ///
    /// Messages published after this returns are delivered in broker order.
    fn subscribe(
        &self,
        topic: &'static str,
    ) -> impl Future<Output = Result<Self::Subscription, BrokerError>> + Send;

    /// Flush pending output and release the connection.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
