//! Shared wire types for the feedcast services.
//!
//! The `objects` module is always available. Typed HTTP and WebSocket
//! clients live behind the `client` feature.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
