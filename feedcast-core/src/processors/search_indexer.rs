//! SearchIndexer processor.
//!
//! Push-subscribes to `FeedCreated` and writes each feed into the search
//! index. Indexing failures are logged; the event is not retried.

use std::sync::Arc;

use tracing::{debug, error};

use crate::entities::Feed;
use crate::events::{EventHandler, FeedCreated};
use crate::search::SearchRepository;

pub struct SearchIndexer {
    repository: Arc<dyn SearchRepository>,
}

impl SearchIndexer {
    pub fn new(repository: Arc<dyn SearchRepository>) -> Self {
        Self { repository }
    }
}

impl EventHandler<FeedCreated> for SearchIndexer {
    async fn handle(&self, event: FeedCreated) {
        let feed = Feed::from(event);
        match self.repository.index_feed(&feed).await {
            Ok(()) => debug!(feed_id = %feed.id, "Feed indexed"),
            Err(e) => error!(feed_id = %feed.id, error = %e, "Failed to index feed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::LocalBroker;
    use crate::events::{BrokerEventStore, EventStore};
    use crate::search::SearchError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingRepository {
        indexed: Mutex<Vec<Feed>>,
    }

    #[async_trait]
    impl SearchRepository for RecordingRepository {
        async fn index_feed(&self, feed: &Feed) -> Result<(), SearchError> {
            self.indexed.lock().await.push(feed.clone());
            Ok(())
        }

        async fn search_feed(&self, _query: &str) -> Result<Vec<Feed>, SearchError> {
            Ok(self.indexed.lock().await.clone())
        }
    }

    #[tokio::test]
    async fn test_published_feed_is_indexed() {
        let repository = Arc::new(RecordingRepository::default());
        let store = BrokerEventStore::new(LocalBroker::new());
        store
            .subscribe_push::<FeedCreated, _>(SearchIndexer::new(repository.clone()))
            .await
            .unwrap();

        let feed = Feed::new("indexed".into(), "by the indexer".into());
        store.publish(&FeedCreated::from(&feed)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while repository.indexed.lock().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(repository.indexed.lock().await[0], feed);

        store.close().await;
    }
}
