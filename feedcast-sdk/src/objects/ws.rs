//! WebSocket message types for the feed stream.
//!
//! The `GET /ws` endpoint of the pusher upgrades to a WebSocket connection
//! and pushes [`WsServerMessage`] JSON frames.
//!
//! # Protocol
//!
//! 1. No frame is sent on connect; the client only receives feeds created
//!    after its registration with the broadcast hub.
//! 2. Each created feed is pushed as one [`WsServerMessage::FeedCreated`]
//!    text frame.
//! 3. Messages sent by the client are ignored. The read side of the socket
//!    is only used to notice disconnection.
//! 4. When the server drops the connection (shutdown, or the client fell
//!    too far behind) it sends a close frame with a [`WsCloseCode`].

use serde::{Deserialize, Serialize};

use super::feed::FeedResponse;

/// Server-to-client WebSocket message.
///
/// Serialized as an internally-tagged JSON object:
///
/// ```json
/// {"type":"feed_created","feed":{"id":"...","title":"...","description":"...","created_at":"..."}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    /// A feed was created on the write side.
    FeedCreated { feed: FeedResponse },
}

/// Well-known WebSocket close codes used by the feed stream.
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;

    /// The server is shutting down or dropped the connection.
    pub const GOING_AWAY: u16 = 1001;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn test_feed_created_is_tagged() {
        let msg = WsServerMessage::FeedCreated {
            feed: FeedResponse {
                id: Uuid::nil(),
                title: "t".to_string(),
                description: "d".to_string(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "feed_created");
        assert_eq!(value["feed"]["title"], "t");

        let back: WsServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }
}
