//! Event type definitions for the event fabric.
//!
//! Every event that travels over the broker implements [`DomainEvent`],
//! which binds the Rust type to an [`EventKind`] and, through it, to the
//! broker topic it is published on.

use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use uuid::Uuid;

/// The kinds of domain events known to the fabric.
///
/// Each kind owns exactly one broker topic (see [`EventKind::topic`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A feed was persisted by the write side.
    FeedCreated,
}

impl EventKind {
    /// Broker topic that carries events of this kind.
    pub const fn topic(self) -> &'static str {
        match self {
            EventKind::FeedCreated => "created_feed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.topic())
    }
}

/// A value that can be published on, and decoded from, the broker.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind (and therefore topic) of this event type.
    const KIND: EventKind;
}

/// Event emitted after a feed has been inserted into the relational store.
///
/// Immutable once published: consumers receive their own decoded copy.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeedCreated {
    /// Producer-assigned identifier, equal to the stored feed's id.
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl DomainEvent for FeedCreated {
    const KIND: EventKind = EventKind::FeedCreated;
}
