//! Message codec for broker payloads.
//!
//! Events are JSON-encoded inside a small envelope that records the event
//! kind:
//!
//! ```json
//! {"kind":"created_feed","event":{ ... }}
//! ```
//!
//! The format is private to the fabric. Publishers and subscribers must be
//! built from the same version of this crate; there is no schema evolution.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::DomainEvent;

/// Errors produced while encoding or decoding broker payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("payload kind {found:?} does not match expected {expected:?}")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },
}

#[derive(Serialize)]
struct EnvelopeRef<'a, E> {
    kind: &'static str,
    event: &'a E,
}

#[derive(Deserialize)]
struct Envelope<E> {
    kind: String,
    event: E,
}

/// Encode `event` into an opaque broker payload.
pub fn encode<E: DomainEvent>(event: &E) -> Result<Bytes, CodecError> {
    let envelope = EnvelopeRef {
        kind: E::KIND.topic(),
        event,
    };
    serde_json::to_vec(&envelope)
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

/// Decode a broker payload into an event of type `E`.
pub fn decode<E: DomainEvent>(payload: &[u8]) -> Result<E, CodecError> {
    let envelope: Envelope<E> = serde_json::from_slice(payload).map_err(CodecError::Decode)?;
    let expected = E::KIND.topic();
    if envelope.kind != expected {
        return Err(CodecError::KindMismatch {
            expected,
            found: envelope.kind,
        });
    }
    Ok(envelope.event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FeedCreated;
    use time::macros::datetime;
    use uuid::Uuid;

    fn sample() -> FeedCreated {
        FeedCreated {
            id: Uuid::now_v7(),
            title: "Go 1.22".to_string(),
            description: "release notes".to_string(),
            created_at: datetime!(2024-02-06 17:03:12.123456789 UTC),
        }
    }

    #[test]
    fn test_roundtrip_preserves_every_field() {
        let event = sample();
        let payload = encode(&event).unwrap();
        let decoded: FeedCreated = decode(&payload).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_envelope_carries_kind() {
        let payload = encode(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["kind"], "created_feed");
        assert_eq!(value["event"]["title"], "Go 1.22");
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode::<FeedCreated>(b"\x00\x01not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));

        let err = decode::<FeedCreated>(br#"{"kind":"created_feed","event":{"id":1}}"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_foreign_kind_is_rejected() {
        let event = sample();
        let payload = serde_json::to_vec(&serde_json::json!({
            "kind": "deleted_feed",
            "event": event,
        }))
        .unwrap();

        let err = decode::<FeedCreated>(&payload).unwrap_err();
        assert!(matches!(
            err,
            CodecError::KindMismatch {
                expected: "created_feed",
                ref found,
            } if found == "deleted_feed"
        ));
    }
}
