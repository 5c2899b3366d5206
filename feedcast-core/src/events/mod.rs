//! Event fabric connecting the feed services.
//!
//! # Event Flow
//!
//! 1. The feed service inserts a feed and publishes `FeedCreated`
//! 2. The query service's `SearchIndexer` (push) indexes it
//! 3. The pusher service's `FeedPusher` (push) hands it to the `BroadcastHub`,
//!    which fans it out to every connected WebSocket client
//!
//! Events travel as codec-encoded payloads over a [`Broker`] topic derived
//! from their [`EventKind`]. Delivery is at-most-once with no replay for
//! late subscribers.
//!
//! [`Broker`]: crate::broker::Broker

pub mod binding;
pub mod channels;
pub mod codec;
pub mod store;
pub mod types;

pub use binding::BrokerEventStore;
pub use channels::{CLIENT_QUEUE_BUFFER, DEFAULT_CHANNEL_BUFFER, SUBSCRIPTION_BUFFER};
pub use codec::CodecError;
pub use store::{
    DropObserver, DroppedMessage, EventHandler, EventStore, EventStoreError, EventStream,
};
pub use types::{DomainEvent, EventKind, FeedCreated};
