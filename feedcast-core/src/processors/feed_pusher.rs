//! FeedPusher processor.
//!
//! Push-subscribes to `FeedCreated` and hands each event to the
//! [`BroadcastHub`](super::BroadcastHub) as a serialized
//! [`WsServerMessage`], so every connected client receives it.

use std::sync::Arc;

use feedcast_sdk::objects::{FeedResponse, WsServerMessage};
use tracing::{debug, error, warn};

use super::broadcast_hub::{HubError, HubHandle};
use crate::events::{EventHandler, FeedCreated};

pub struct FeedPusher {
    hub: HubHandle,
}

impl FeedPusher {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }

    /// Render the frame sent to clients for `event`.
    pub fn frame(event: &FeedCreated) -> Result<Arc<str>, serde_json::Error> {
        let message = WsServerMessage::FeedCreated {
            feed: FeedResponse::from(event),
        };
        serde_json::to_string(&message).map(Arc::from)
    }
}

impl EventHandler<FeedCreated> for FeedPusher {
    async fn handle(&self, event: FeedCreated) {
        let payload = match Self::frame(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(feed_id = %event.id, error = %e, "Failed to serialize feed frame");
                return;
            }
        };
        match self.hub.broadcast(payload, None).await {
            Ok(()) => debug!(feed_id = %event.id, "Feed queued for broadcast"),
            Err(HubError::Stopped) => {
                warn!(feed_id = %event.id, "BroadcastHub stopped, feed not pushed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::broadcast_hub::broadcast_hub;
    use time::OffsetDateTime;
    use tokio::sync::watch;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_event_is_broadcast_as_ws_frame() {
        let (hub, handle) = broadcast_hub();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(hub.run(shutdown_rx));

        let (conn, mut rx) = handle.new_connection();
        handle.register(conn).await.unwrap();

        let event = FeedCreated {
            id: Uuid::now_v7(),
            title: "f1".into(),
            description: "first".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        FeedPusher::new(handle).handle(event.clone()).await;

        let frame = rx.recv().await.unwrap();
        let message: WsServerMessage = serde_json::from_str(&frame).unwrap();
        let WsServerMessage::FeedCreated { feed } = message;
        assert_eq!(feed.id, event.id);
        assert_eq!(feed.title, "f1");
    }
}
