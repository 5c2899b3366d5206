//! WebSocket client for the pusher's feed stream.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::ws::{WsCloseCode, WsServerMessage};

/// A live subscription to `GET /ws`.
pub struct FeedStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl FeedStream {
    /// Connect to the feed stream at `url` (e.g. `ws://localhost:8080/ws`).
    pub async fn connect(url: &Url) -> Result<Self, ClientError> {
        let (socket, _response) = connect_async(url.as_str()).await?;
        Ok(Self { socket })
    }

    /// Wait for the next server message.
    ///
    /// Returns `None` once the server closed the connection. Control frames
    /// are skipped.
    pub async fn next_message(&mut self) -> Option<Result<WsServerMessage, ClientError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(&text).map_err(ClientError::Json));
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    /// Send a normal-closure frame and wait for the server to acknowledge it.
    pub async fn close(mut self) -> Result<(), ClientError> {
        let frame = CloseFrame {
            code: CloseCode::from(WsCloseCode::NORMAL),
            reason: "".into(),
        };
        self.socket.send(Message::Close(Some(frame))).await?;
        while let Some(frame) = self.socket.next().await {
            if frame.is_err() {
                break;
            }
        }
        Ok(())
    }
}
