//! Write-side feed handlers.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use feedcast_core::entities::{Feed, InsertFeed};
use feedcast_core::events::{EventStore, FeedCreated};
use feedcast_sdk::objects::{CreateFeedRequest, FeedResponse};
use kanau::processor::Processor;

use super::ApiError;
use crate::state::FeedState;

/// Build the feed service router.
pub fn router<S: EventStore>() -> Router<FeedState<S>> {
    Router::new().route("/feeds", post(create_feed::<S>))
}

/// `POST /feeds` – store a feed, then announce it with `FeedCreated`.
///
/// The feed is committed before the event is published; a broker failure
/// leaves the row in place and answers 502.
async fn create_feed<S: EventStore>(
    State(state): State<FeedState<S>>,
    Json(request): Json<CreateFeedRequest>,
) -> Result<(StatusCode, Json<FeedResponse>), ApiError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty"));
    }

    let feed = state
        .db
        .process(InsertFeed {
            feed: Feed::new(title.to_string(), request.description),
        })
        .await
        .map_err(ApiError::Database)?;

    state
        .events
        .publish(&FeedCreated::from(&feed))
        .await
        .map_err(ApiError::Broker)?;

    tracing::info!(feed_id = %feed.id, "Feed created");
    Ok((StatusCode::CREATED, Json(feed.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use feedcast_core::broker::LocalBroker;
    use feedcast_core::events::BrokerEventStore;
    use feedcast_core::framework::DatabaseProcessor;
    use sqlx::PgPool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let pool = PgPool::connect_lazy("postgres://feedcast@localhost/feedcast").unwrap();
        let state = FeedState {
            db: DatabaseProcessor::new(pool),
            events: Arc::new(BrokerEventStore::new(LocalBroker::new())),
        };
        router().with_state(state)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::post("/feeds")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let response = app()
            .oneshot(post_json(r#"{"title":"   ","description":"d"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_title_is_rejected() {
        let response = app()
            .oneshot(post_json(r#"{"description":"d"}"#))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
