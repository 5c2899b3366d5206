use crate::events::FeedCreated;
use crate::framework::DatabaseProcessor;
use feedcast_sdk::objects::FeedResponse;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

/// A feed row in the `feeds` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

impl Feed {
    /// Build a new feed with a fresh time-ordered id, stamped now.
    pub fn new(title: String, description: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            title,
            description,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

impl From<FeedCreated> for Feed {
    fn from(event: FeedCreated) -> Self {
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            created_at: event.created_at,
        }
    }
}

impl From<&Feed> for FeedCreated {
    fn from(feed: &Feed) -> Self {
        Self {
            id: feed.id,
            title: feed.title.clone(),
            description: feed.description.clone(),
            created_at: feed.created_at,
        }
    }
}

impl From<Feed> for FeedResponse {
    fn from(feed: Feed) -> Self {
        Self {
            id: feed.id,
            title: feed.title,
            description: feed.description,
            created_at: feed.created_at,
        }
    }
}

impl From<&FeedCreated> for FeedResponse {
    fn from(event: &FeedCreated) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            description: event.description.clone(),
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Clone)]
/// Insert a feed and return the stored row.
pub struct InsertFeed {
    pub feed: Feed,
}

impl Processor<InsertFeed> for DatabaseProcessor {
    type Output = Feed;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertFeed")]
    async fn process(&self, insert: InsertFeed) -> Result<Feed, sqlx::Error> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (id, title, description, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, created_at
            "#,
        )
        .bind(insert.feed.id)
        .bind(insert.feed.title)
        .bind(insert.feed.description)
        .bind(insert.feed.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(feed)
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// List every stored feed, newest first.
pub struct ListFeeds;

impl Processor<ListFeeds> for DatabaseProcessor {
    type Output = Vec<Feed>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListFeeds")]
    async fn process(&self, _: ListFeeds) -> Result<Vec<Feed>, sqlx::Error> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, title, description, created_at
            FROM feeds
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_feed_has_fresh_id() {
        let a = Feed::new("a".into(), String::new());
        let b = Feed::new("b".into(), String::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_conversions_keep_every_field() {
        let feed = Feed::new("Rust 2024".into(), "edition notes".into());

        let event = FeedCreated::from(&feed);
        assert_eq!(event.id, feed.id);
        assert_eq!(event.created_at, feed.created_at);

        let response = FeedResponse::from(&event);
        assert_eq!(response.title, "Rust 2024");
        assert_eq!(response.description, "edition notes");

        assert_eq!(Feed::from(event), feed);
    }
}
