//! Event processors.
//!
//! - `SearchIndexer`: Receives `FeedCreated`, writes the search index
//! - `FeedPusher`: Receives `FeedCreated`, broadcasts through the `BroadcastHub`
//! - `BroadcastHub`: Fans payloads out to connected real-time clients

pub mod broadcast_hub;
pub mod feed_pusher;
pub mod search_indexer;

pub use broadcast_hub::{
    BroadcastHub, ClientConnection, ConnectionId, DeliveryError, HubError, HubHandle,
    broadcast_hub,
};
pub use feed_pusher::FeedPusher;
pub use search_indexer::SearchIndexer;
