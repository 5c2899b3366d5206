//! Full-text search over feeds.
//!
//! The query service reads from a [`SearchRepository`]; the indexer writes
//! to it as `FeedCreated` events arrive.

pub mod elastic;

use async_trait::async_trait;
use thiserror::Error;

use crate::entities::Feed;

pub use elastic::ElasticSearchRepository;

/// Errors that can occur while talking to the search index.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP transport error
    #[error("search request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The index answered with a non-success status
    #[error("search index returned {status}: {body}")]
    Index { status: u16, body: String },

    /// Invalid index address
    #[error("invalid search index url: {0}")]
    Url(#[from] url::ParseError),
}

/// Storage for searchable feed documents.
#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Index (or re-index) `feed` under its id.
    async fn index_feed(&self, feed: &Feed) -> Result<(), SearchError>;

    /// Fuzzy-match `query` against feed titles and descriptions.
    async fn search_feed(&self, query: &str) -> Result<Vec<Feed>, SearchError>;
}
