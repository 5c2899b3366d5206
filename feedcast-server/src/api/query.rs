//! Read-side feed handlers.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use feedcast_core::entities::ListFeeds;
use feedcast_sdk::objects::{FeedResponse, SearchFeedsQuery};
use kanau::processor::Processor;

use super::ApiError;
use crate::state::QueryState;

/// Build the query service router.
pub fn router() -> Router<QueryState> {
    Router::new()
        .route("/feeds", get(list_feeds))
        .route("/feeds/search", get(search_feeds))
}

/// `GET /feeds` – every stored feed, newest first.
async fn list_feeds(State(state): State<QueryState>) -> Result<Json<Vec<FeedResponse>>, ApiError> {
    let feeds = state
        .db
        .process(ListFeeds)
        .await
        .map_err(ApiError::Database)?;
    Ok(Json(feeds.into_iter().map(FeedResponse::from).collect()))
}

/// `GET /feeds/search?q=…` – fuzzy search over title and description.
async fn search_feeds(
    State(state): State<QueryState>,
    Query(query): Query<SearchFeedsQuery>,
) -> Result<Json<Vec<FeedResponse>>, ApiError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Err(ApiError::BadRequest("missing query parameter"));
    }

    let feeds = state
        .search
        .search_feed(q)
        .await
        .map_err(ApiError::Search)?;
    Ok(Json(feeds.into_iter().map(FeedResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use feedcast_core::entities::Feed;
    use feedcast_core::framework::DatabaseProcessor;
    use feedcast_core::search::{SearchError, SearchRepository};
    use sqlx::PgPool;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct FixedResults(Vec<Feed>);

    #[async_trait]
    impl SearchRepository for FixedResults {
        async fn index_feed(&self, _feed: &Feed) -> Result<(), SearchError> {
            Ok(())
        }

        async fn search_feed(&self, query: &str) -> Result<Vec<Feed>, SearchError> {
            Ok(self
                .0
                .iter()
                .filter(|f| f.title.contains(query))
                .cloned()
                .collect())
        }
    }

    fn app(feeds: Vec<Feed>) -> Router {
        let pool = PgPool::connect_lazy("postgres://feedcast@localhost/feedcast").unwrap();
        router().with_state(QueryState {
            db: DatabaseProcessor::new(pool),
            search: Arc::new(FixedResults(feeds)),
        })
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        for uri in ["/feeds/search", "/feeds/search?q=", "/feeds/search?q=%20"] {
            let response = app(vec![]).oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_search_returns_matches() {
        let feeds = vec![
            Feed::new("rust weekly".into(), "news".into()),
            Feed::new("go weekly".into(), "news".into()),
        ];
        let response = app(feeds)
            .oneshot(get("/feeds/search?q=rust"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let results: Vec<FeedResponse> = serde_json::from_slice(&body).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "rust weekly");
    }
}
