//! BroadcastHub processor.
//!
//! The BroadcastHub is responsible for:
//! - Tracking every connected real-time client
//! - Fanning broadcast payloads out to all of them, optionally skipping one
//! - Dropping clients whose outbound queue is full or closed
//!
//! All operations are commands on a single queue consumed by one task, so
//! they take effect in the order they were issued and the registry needs no
//! locking. Delivery to a client never blocks the hub: each client has its
//! own bounded queue that a transport writer drains.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::events::channels::{CLIENT_QUEUE_BUFFER, DEFAULT_CHANNEL_BUFFER};

/// Identity of a registered client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Errors returned by [`HubHandle`] operations.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("broadcast hub is stopped")]
    Stopped,
}

/// Why a payload could not be handed to a client.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("client outbound queue is full")]
    QueueFull,

    #[error("client connection is closed")]
    Closed,
}

/// The hub's side of a client connection.
///
/// Dropping it closes the outbound queue, which tells the transport writer
/// to close the connection.
#[derive(Debug)]
pub struct ClientConnection {
    id: ConnectionId,
    outbound: mpsc::Sender<Arc<str>>,
}

impl ClientConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    fn deliver(&self, payload: Arc<str>) -> Result<(), DeliveryError> {
        self.outbound.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

enum HubCommand {
    Register(ClientConnection),
    Unregister(ConnectionId),
    Broadcast {
        payload: Arc<str>,
        excluded: Option<ConnectionId>,
    },
    ConnectionCount(oneshot::Sender<usize>),
}

/// Create a hub and the handle used to talk to it.
///
/// The hub does nothing until [`BroadcastHub::run`] is spawned.
pub fn broadcast_hub() -> (BroadcastHub, HubHandle) {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
    let hub = BroadcastHub {
        commands: rx,
        clients: HashMap::new(),
    };
    let handle = HubHandle {
        commands: tx,
        next_id: Arc::new(AtomicU64::new(1)),
    };
    (hub, handle)
}

/// Cloneable handle for issuing commands to a running [`BroadcastHub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl HubHandle {
    /// Allocate a new connection and the receiving end of its outbound queue.
    ///
    /// The connection is not registered yet; pass it to [`register`](Self::register).
    pub fn new_connection(&self) -> (ClientConnection, mpsc::Receiver<Arc<str>>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbound, rx) = mpsc::channel(CLIENT_QUEUE_BUFFER);
        (ClientConnection { id, outbound }, rx)
    }

    pub async fn register(&self, conn: ClientConnection) -> Result<(), HubError> {
        self.send(HubCommand::Register(conn)).await
    }

    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister(id)).await
    }

    /// Queue `payload` for every registered client except `excluded`.
    pub async fn broadcast(
        &self,
        payload: impl Into<Arc<str>>,
        excluded: Option<ConnectionId>,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Broadcast {
            payload: payload.into(),
            excluded,
        })
        .await
    }

    /// Number of currently registered clients.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::ConnectionCount(tx)).await?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Stopped)
    }
}

/// BroadcastHub owns the client registry and processes hub commands.
pub struct BroadcastHub {
    commands: mpsc::Receiver<HubCommand>,
    clients: HashMap<ConnectionId, ClientConnection>,
}

impl BroadcastHub {
    /// Run the BroadcastHub.
    ///
    /// Returns when shutdown is signalled or every [`HubHandle`] is dropped.
    /// Pending commands are discarded and every client is dropped on exit.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("BroadcastHub started");

        if !*shutdown_rx.borrow_and_update() {
            loop {
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("BroadcastHub received shutdown signal");
                            break;
                        }
                    }

                    command = self.commands.recv() => match command {
                        Some(command) => self.handle(command),
                        None => {
                            info!("All hub handles dropped");
                            break;
                        }
                    },
                }
            }
        }

        self.commands.close();
        let count = self.clients.len();
        self.clients.clear();
        info!(dropped_clients = count, "BroadcastHub shutdown complete");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(conn) => {
                let id = conn.id();
                if self.clients.insert(id, conn).is_some() {
                    warn!(%id, "Connection registered twice, replacing");
                }
                debug!(%id, clients = self.clients.len(), "Client registered");
            }
            HubCommand::Unregister(id) => {
                if self.clients.remove(&id).is_some() {
                    debug!(%id, clients = self.clients.len(), "Client unregistered");
                }
            }
            HubCommand::Broadcast { payload, excluded } => self.broadcast(payload, excluded),
            HubCommand::ConnectionCount(reply) => {
                let _ = reply.send(self.clients.len());
            }
        }
    }

    fn broadcast(&mut self, payload: Arc<str>, excluded: Option<ConnectionId>) {
        let mut failed = Vec::new();
        for (id, conn) in &self.clients {
            if Some(*id) == excluded {
                continue;
            }
            if let Err(e) = conn.deliver(payload.clone()) {
                warn!(%id, error = %e, "Dropping client after failed delivery");
                failed.push(*id);
            }
        }
        for id in failed {
            self.clients.remove(&id);
        }
        debug!(clients = self.clients.len(), "Broadcast delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    fn spawn_hub() -> (HubHandle, watch::Sender<bool>, JoinHandle<()>) {
        let (hub, handle) = broadcast_hub();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(hub.run(shutdown_rx));
        (handle, shutdown_tx, task)
    }

    async fn connect(handle: &HubHandle) -> (ConnectionId, mpsc::Receiver<Arc<str>>) {
        let (conn, rx) = handle.new_connection();
        let id = conn.id();
        handle.register(conn).await.unwrap();
        (id, rx)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let (handle, _shutdown_tx, _task) = spawn_hub();
        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(connect(&handle).await);
        }

        handle.broadcast("hello", None).await.unwrap();

        for (_, rx) in &mut clients {
            assert_eq!(&*rx.recv().await.unwrap(), "hello");
        }
        assert_eq!(handle.connection_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_excluded_client_is_skipped() {
        let (handle, _shutdown_tx, _task) = spawn_hub();
        let (a, mut rx_a) = connect(&handle).await;
        let (_, mut rx_b) = connect(&handle).await;

        handle.broadcast("first", Some(a)).await.unwrap();
        handle.broadcast("second", None).await.unwrap();

        assert_eq!(&*rx_b.recv().await.unwrap(), "first");
        assert_eq!(&*rx_a.recv().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_failed_client_is_removed_others_still_served() {
        let (handle, _shutdown_tx, _task) = spawn_hub();
        let (_, mut rx_1) = connect(&handle).await;
        let (_, rx_2) = connect(&handle).await;
        let (_, mut rx_3) = connect(&handle).await;
        drop(rx_2);

        handle.broadcast("m", None).await.unwrap();

        assert_eq!(&*rx_1.recv().await.unwrap(), "m");
        assert_eq!(&*rx_3.recv().await.unwrap(), "m");
        assert_eq!(handle.connection_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_slow_client_is_dropped_when_queue_full() {
        let (handle, _shutdown_tx, _task) = spawn_hub();
        let (_, mut slow) = connect(&handle).await;

        for i in 0..=CLIENT_QUEUE_BUFFER {
            handle.broadcast(format!("m{i}"), None).await.unwrap();
        }
        assert_eq!(handle.connection_count().await.unwrap(), 0);

        // The queued frames are still readable, then the queue ends.
        let mut received = 0;
        while slow.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, CLIENT_QUEUE_BUFFER);
    }

    #[tokio::test]
    async fn test_unregister_closes_queue() {
        let (handle, _shutdown_tx, _task) = spawn_hub();
        let (id, mut rx) = connect(&handle).await;

        handle.unregister(id).await.unwrap();

        assert!(rx.recv().await.is_none());
        assert_eq!(handle.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commands_apply_in_issue_order() {
        let (handle, _shutdown_tx, _task) = spawn_hub();
        let (_, mut early) = connect(&handle).await;

        handle.broadcast("before", None).await.unwrap();
        let (_, mut late) = connect(&handle).await;
        handle.broadcast("after", None).await.unwrap();

        assert_eq!(&*early.recv().await.unwrap(), "before");
        assert_eq!(&*early.recv().await.unwrap(), "after");
        assert_eq!(&*late.recv().await.unwrap(), "after");
    }

    #[tokio::test]
    async fn test_shutdown_drops_clients_and_stops_handle() {
        let (handle, shutdown_tx, task) = spawn_hub();
        let (_, mut rx) = connect(&handle).await;

        shutdown_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        assert!(rx.recv().await.is_none());
        assert!(matches!(
            handle.broadcast("late", None).await,
            Err(HubError::Stopped)
        ));
        assert!(matches!(
            handle.connection_count().await,
            Err(HubError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_hub_stops_when_handles_dropped() {
        let (handle, shutdown_tx, task) = spawn_hub();
        let (_, mut rx) = connect(&handle).await;

        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        assert!(rx.recv().await.is_none());
        // The shutdown sender was alive the whole time.
        assert!(!*shutdown_tx.borrow());
    }
}
