//! Elasticsearch-backed [`SearchRepository`].
//!
//! Talks to the REST API directly: documents live in the `feeds` index,
//! keyed by feed id, and searches are a `multi_match` over title and
//! description.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{SearchError, SearchRepository};
use crate::entities::Feed;

const INDEX: &str = "feeds";
const FUZZINESS: u8 = 3;

#[derive(Debug, Serialize, Deserialize)]
struct FeedDocument {
    id: Uuid,
    title: String,
    description: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<&Feed> for FeedDocument {
    fn from(feed: &Feed) -> Self {
        Self {
            id: feed.id,
            title: feed.title.clone(),
            description: feed.description.clone(),
            created_at: feed.created_at,
        }
    }
}

impl From<FeedDocument> for Feed {
    fn from(doc: FeedDocument) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: FeedDocument,
}

/// Search repository backed by an Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticSearchRepository {
    base_url: Url,
    http_client: reqwest::Client,
}

impl ElasticSearchRepository {
    /// Create a repository for the cluster at `base_url`
    /// (e.g. `http://localhost:9200`).
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http_client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, SearchError> {
        Ok(self.base_url.join(path)?)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SearchError::Index {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SearchRepository for ElasticSearchRepository {
    async fn index_feed(&self, feed: &Feed) -> Result<(), SearchError> {
        let url = self.endpoint(&format!("{INDEX}/_doc/{}", feed.id))?;
        let response = self
            .http_client
            .put(url)
            .query(&[("refresh", "wait_for")])
            .json(&FeedDocument::from(feed))
            .send()
            .await?;
        Self::check(response).await?;
        debug!(feed_id = %feed.id, "Indexed feed");
        Ok(())
    }

    async fn search_feed(&self, query: &str) -> Result<Vec<Feed>, SearchError> {
        let url = self.endpoint(&format!("{INDEX}/_search"))?;
        let body = json!({
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["title", "description"],
                    "fuzziness": FUZZINESS,
                }
            }
        });
        let response = self.http_client.post(url).json(&body).send().await?;
        let result: SearchResponse = Self::check(response).await?.json().await?;

        let feeds: Vec<Feed> = result
            .hits
            .hits
            .into_iter()
            .map(|hit| hit.source.into())
            .collect();
        debug!(%query, hits = feeds.len(), "Searched feeds");
        Ok(feeds)
    }
}
