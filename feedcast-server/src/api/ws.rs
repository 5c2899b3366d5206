use axum::{
    Router,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use feedcast_core::processors::HubHandle;
use feedcast_sdk::objects::WsCloseCode;
use futures_util::{SinkExt, StreamExt};

use crate::state::PusherState;

/// Build the pusher service router.
pub fn router() -> Router<PusherState> {
    Router::new().route("/ws", get(feed_stream_ws))
}

/// `GET /ws`: real-time feed stream.
///
/// Upgrades the HTTP connection to a WebSocket and registers it with the
/// broadcast hub. Every feed created after registration is pushed as a
/// `WsServerMessage` text frame.
async fn feed_stream_ws(
    State(state): State<PusherState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_feed_ws(socket, state.hub))
}

/// Drives a single WebSocket connection.
///
/// 1. Registers a new connection with the hub.
/// 2. A writer task drains the connection's queue into the socket and
///    sends a close frame once the hub drops the queue.
/// 3. The read loop only watches for the client going away, then
///    unregisters.
async fn handle_feed_ws(socket: WebSocket, hub: HubHandle) {
    let (conn, mut outbound) = hub.new_connection();
    let id = conn.id();
    let (mut sink, mut stream) = socket.split();

    if hub.register(conn).await.is_err() {
        tracing::warn!(%id, "WS: broadcast hub stopped, rejecting connection");
        let _ = sink.send(going_away()).await;
        return;
    }
    tracing::debug!(%id, "WS: client connected");

    let mut writer = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if sink.send(Message::Text(payload.to_string().into())).await.is_err() {
                return;
            }
        }
        // The hub dropped this client: unregistered, too slow, or shutting down.
        let _ = sink.send(going_away()).await;
    });

    let writer_finished = loop {
        tokio::select! {
            _ = &mut writer => break true,

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break false,
                    Some(Ok(_)) => {}
                }
            }
        }
    };

    // Fails only if the hub already stopped, which drops every client anyway.
    let _ = hub.unregister(id).await;
    if !writer_finished {
        let _ = writer.await;
    }
    tracing::debug!(%id, "WS: client disconnected");
}

fn going_away() -> Message {
    Message::Close(Some(CloseFrame {
        code: WsCloseCode::GOING_AWAY,
        reason: Utf8Bytes::from_static("going away"),
    }))
}
