//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /feeds`         – create a feed (`feed` service)
//! - `GET  /feeds`         – list feeds (`query` service)
//! - `GET  /feeds/search`  – full-text search (`query` service)
//! - `GET  /ws`            – real-time feed stream (`pusher` service)

use axum::{http::StatusCode, response::IntoResponse};
use feedcast_core::events::EventStoreError;
use feedcast_core::search::SearchError;

pub mod feeds;
pub mod query;
pub mod ws;

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The request was malformed.
    BadRequest(&'static str),
    /// A database query failed.
    Database(sqlx::Error),
    /// The search index failed.
    Search(SearchError),
    /// The event could not be published.
    Broker(EventStoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            ApiError::Database(e) => {
                tracing::error!(error = %e, "API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ApiError::Search(e) => {
                tracing::error!(error = %e, "API search error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ApiError::Broker(e) => {
                tracing::error!(error = %e, "API event publish error");
                (StatusCode::BAD_GATEWAY, "failed to publish event").into_response()
            }
        }
    }
}
