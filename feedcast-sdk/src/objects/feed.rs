//! Feed DTOs for the HTTP API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A feed as returned by every endpoint that yields feeds.
///
/// `created_at` is serialized as an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Body of `POST /feeds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFeedRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Query string of `GET /feeds/search`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFeedsQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_response_json_shape() {
        let feed = FeedResponse {
            id: Uuid::nil(),
            title: "Go 1.22".to_string(),
            description: "release notes".to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let value = serde_json::to_value(&feed).unwrap();
        assert_eq!(value["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(value["title"], "Go 1.22");
        assert_eq!(value["created_at"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_create_request_description_defaults_to_empty() {
        let req: CreateFeedRequest = serde_json::from_str(r#"{"title":"only a title"}"#).unwrap();
        assert_eq!(req.title, "only a title");
        assert!(req.description.is_empty());
    }
}
