use serde::{de::DeserializeOwned, Serialize};

// ============================================================================
// Event Codec - JSON payloads for bus messages
// ============================================================================
//
// Decoding is strict: every field must be present and well-typed, and each
// event may add its own validation. A payload that fails here is a poison
// message for the consumer.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventCodecError {
    #[error("failed to encode {event_type}: {source}")]
    Encode {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed {event_type} payload: {source}")]
    Malformed {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {event_type} payload: {reason}")]
    Invalid {
        event_type: &'static str,
        reason: String,
    },
}

/// Events exchanged between services over the bus.
pub trait IntegrationEvent: Serialize + DeserializeOwned + Send + Sync {
    fn event_type() -> &'static str
    where
        Self: Sized;

    /// Key used by the bus to keep per-order ordering.
    fn partition_key(&self) -> String;

    fn validate(&self) -> Result<(), EventCodecError> {
        Ok(())
    }
}

pub fn encode_event<E: IntegrationEvent>(event: &E) -> Result<Vec<u8>, EventCodecError> {
    serde_json::to_vec(event).map_err(|source| EventCodecError::Encode {
        event_type: E::event_type(),
        source,
    })
}

pub fn decode_event<E: IntegrationEvent>(payload: &[u8]) -> Result<E, EventCodecError> {
    let event: E = serde_json::from_slice(payload).map_err(|source| EventCodecError::Malformed {
        event_type: E::event_type(),
        source,
    })?;
    event.validate()?;
    Ok(event)
}
