//! Application state shared across request handlers.
//!
//! Each service role has its own state type; all of them are cheap to clone.

use feedcast_core::framework::DatabaseProcessor;
use feedcast_core::processors::HubHandle;
use feedcast_core::search::SearchRepository;
use std::sync::Arc;

/// State of the `feed` (write) service.
///
/// Generic over the event store so tests can run against the in-process
/// broker.
pub struct FeedState<S> {
    pub db: DatabaseProcessor,
    pub events: Arc<S>,
}

impl<S> Clone for FeedState<S> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            events: self.events.clone(),
        }
    }
}

/// State of the `query` (read) service.
#[derive(Clone)]
pub struct QueryState {
    pub db: DatabaseProcessor,
    pub search: Arc<dyn SearchRepository>,
}

/// State of the `pusher` (real-time) service.
#[derive(Clone)]
pub struct PusherState {
    pub hub: HubHandle,
}
