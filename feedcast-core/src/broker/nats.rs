//! NATS core pub/sub transport.
//!
//! Uses plain (non-JetStream) subjects: delivery is at-most-once and a
//! subscriber only sees messages published after it subscribed.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::{Broker, BrokerError, BrokerSubscription};
use crate::events::channels::SUBSCRIPTION_BUFFER;

/// Client name announced to the NATS server.
const CLIENT_NAME: &str = "feedcast";

/// Broker backed by a NATS connection.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Clone, Debug)]
pub struct NatsBroker {
    client: async_nats::Client,
}

impl NatsBroker {
    /// Connect to the NATS server at `url` (e.g. `nats://localhost:4222`).
    ///
    /// Fails immediately if the server cannot be reached; there is no
    /// retry on the initial connection.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = async_nats::ConnectOptions::new()
            .name(CLIENT_NAME)
            .subscription_capacity(SUBSCRIPTION_BUFFER)
            .connect(url)
            .await
            .map_err(|e| BrokerError::Connection(format!("{url}: {e}")))?;
        info!(%url, "Connected to NATS");
        Ok(Self { client })
    }
}

impl Broker for NatsBroker {
    type Subscription = NatsSubscription;

    async fn publish(&self, topic: &'static str, payload: Bytes) -> Result<(), BrokerError> {
        self.client
            .publish(topic.to_string(), payload)
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))
    }

    async fn subscribe(&self, topic: &'static str) -> Result<NatsSubscription, BrokerError> {
        let inner = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))?;
        debug!(%topic, "Subscribed to NATS subject");
        Ok(NatsSubscription { inner })
    }

    /// Flushes pending publishes, then drains every subscription and closes
    /// the connection. Later calls on this broker fail.
    async fn close(&self) {
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "Failed to flush NATS connection on close");
        }
        if let Err(e) = self.client.drain().await {
            warn!(error = %e, "Failed to drain NATS connection on close");
            return;
        }
        info!("NATS connection released");
    }
}

/// A NATS subscriber yielding raw message payloads.
pub struct NatsSubscription {
    inner: async_nats::Subscriber,
}

impl Stream for NatsSubscription {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.inner
            .poll_next_unpin(cx)
            .map(|message| message.map(|m| m.payload))
    }
}

impl BrokerSubscription for NatsSubscription {
    async fn unsubscribe(&mut self) -> Result<(), BrokerError> {
        self.inner
            .unsubscribe()
            .await
            .map_err(|e| BrokerError::Unsubscribe(e.to_string()))
    }
}
