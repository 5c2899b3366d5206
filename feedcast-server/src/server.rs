//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::{FeedState, PusherState, QueryState};
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use feedcast_core::events::EventStore;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the `feed` service router.
pub fn feed_router<S: EventStore>(state: FeedState<S>) -> Router {
    Router::new()
        .merge(api::feeds::router())
        .route("/health", get(health_check))
        .with_state(state)
}

/// Build the `query` service router.
pub fn query_router(state: QueryState) -> Router {
    Router::new()
        .merge(api::query::router())
        .route("/health", get(health_check))
        .with_state(state)
}

/// Build the `pusher` service router.
pub fn pusher_router(state: PusherState) -> Router {
    Router::new()
        .merge(api::ws::router())
        .route("/health", get(pusher_health_check))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    connections: Option<usize>,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: None,
    })
}

/// Health check that also reports the number of live WebSocket clients.
async fn pusher_health_check(State(state): State<PusherState>) -> impl IntoResponse {
    let (status, connections) = match state.hub.connection_count().await {
        Ok(count) => ("healthy", Some(count)),
        Err(_) => ("hub stopped", None),
    };
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        connections,
    })
}

/// Run the server with graceful shutdown on SIGTERM/SIGINT.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);
    serve(listener, router, shutdown_signal()).await
}

/// Serve `router` on `listener` until `shutdown` completes.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use feedcast_core::processors::broadcast_hub;
    use tokio::sync::watch;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_pusher_health_reports_connections() {
        let (hub, handle) = broadcast_hub();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(hub.run(shutdown_rx));

        let response = pusher_router(PusherState { hub: handle })
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["connections"], 0);
    }
}
