//! Channel factories and buffer sizes.
//!
//! Every in-process queue of the fabric is created here so that capacities
//! are defined in one place.

use tokio::sync::mpsc;

/// Capacity of a pull subscription's buffer, and of each broker-native
/// subscription feeding a forwarding task.
///
/// Once a pull buffer holds this many undelivered events the forwarding
/// task blocks, which pushes back on the broker-native subscription.
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// Capacity of the broadcast hub's command queue.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Capacity of a single client connection's outbound queue.
///
/// A client that lets this many frames pile up is treated as failed and
/// dropped by the hub.
pub const CLIENT_QUEUE_BUFFER: usize = 32;

/// Create the bounded channel backing a pull subscription.
pub fn pull_channel<E>() -> (mpsc::Sender<E>, mpsc::Receiver<E>) {
    mpsc::channel(SUBSCRIPTION_BUFFER)
}

/// Create a broker-native subscription channel.
///
/// Used by the in-process broker; the NATS client is configured with the
/// same capacity.
pub fn broker_channel<T>() -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(SUBSCRIPTION_BUFFER)
}
