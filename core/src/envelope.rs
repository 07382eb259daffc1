//! The uniform message envelope and its JSON codec.
//!
//! Every message on the wire is an [`EventEnvelope`]: an event type identifier,
//! an RFC 3339 UTC timestamp, and an opaque JSON payload. The envelope does not
//! validate the payload's shape; the handler that matches the event type decodes
//! it into the structure it expects via [`EventEnvelope::decode_payload`].
//!
//! # Wire format
//!
//! ```json
//! {
//!   "event_type": "portfolio.report",
//!   "timestamp": "2023-06-15T14:30:00Z",
//!   "payload": { "portfolios": [ ... ] }
//! }
//! ```

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the envelope codec.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The payload (or the envelope itself) could not be serialized to JSON.
    #[error("failed to serialize payload: {0}")]
    Serialization(String),

    /// The wire bytes are not a valid envelope.
    #[error("failed to decode envelope: {0}")]
    Decoding(String),

    /// The envelope's payload does not match the requested structure.
    #[error("failed to decode payload: {0}")]
    PayloadDecoding(String),
}

/// The uniform outer message structure carrying event type, timestamp and payload.
///
/// Envelopes are produced by [`EventEnvelope::new`] on the publishing side and
/// by [`EventEnvelope::decode`] on the consuming side. Each delivery is decoded
/// into exactly one envelope, which is owned by the consumer worker for the
/// duration of a single handler call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Event type identifier used for handler routing (e.g. `"portfolio.report"`).
    pub event_type: String,

    /// RFC 3339 UTC timestamp stamped when the envelope was created.
    pub timestamp: String,

    /// Opaque payload. Valid JSON for the structure the matching handler expects.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wrap a typed payload in a new envelope, stamping the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Serialization`] if the payload cannot be
    /// serialized to JSON.
    pub fn new<P: Serialize>(
        event_type: impl Into<String>,
        payload: &P,
    ) -> Result<Self, EnvelopeError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| EnvelopeError::Serialization(e.to_string()))?;

        Ok(Self {
            event_type: event_type.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            payload,
        })
    }

    /// Serialize the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Serialization`] if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Serialization(e.to_string()))
    }

    /// Decode an envelope from wire bytes.
    ///
    /// The event type is not validated against any known set; routing decides
    /// what happens to types nobody handles.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decoding`] on malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Decoding(e.to_string()))
    }

    /// Decode the opaque payload into a caller-supplied shape.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::PayloadDecoding`] if the payload does not match `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| EnvelopeError::PayloadDecoding(e.to_string()))
    }
}
