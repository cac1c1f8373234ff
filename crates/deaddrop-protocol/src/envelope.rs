//! Request and response envelope codec.
//!
//! Envelopes are small JSON documents. Requests carry the command name, an
//! ordered parameter mapping, and the caller's wall-clock stamp; responses
//! carry either a `result` value or an `error` string, correlated to their
//! request solely by sharing the id embedded in the file name.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::status::unix_seconds;

/// Errors raised while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The payload was not valid JSON or did not match the envelope schema.
    #[error("invalid envelope payload: {source}")]
    Malformed {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The envelope could not be serialised.
    #[error("failed to encode envelope: {source}")]
    Encode {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// A command issued by the caller.
///
/// Immutable once written; identity lives in the file name, not the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Name of the operation to invoke.
    pub command: String,
    /// Parameters forwarded verbatim to the handler, in caller order.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Caller wall-clock stamp, seconds since the Unix epoch.
    #[serde(default)]
    pub created_at_unix: f64,
}

impl CommandRequest {
    /// Builds a request stamped with the current wall clock.
    #[must_use]
    pub fn new(command: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            command: command.into(),
            params,
            created_at_unix: unix_seconds(SystemTime::now()),
        }
    }

    /// Serialises the request for writing to disk.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] when serialisation fails.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec_pretty(self).map_err(|source| EnvelopeError::Encode { source })
    }

    /// Parses a request envelope read from disk.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] when the bytes are not valid
    /// JSON or lack the `command` field. The listener converts this into an
    /// error response plus a bad marker rather than retrying forever.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|source| EnvelopeError::Malformed { source })
    }
}

/// The listener's answer to a single request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommandResponse {
    /// The handler completed and produced a value.
    #[serde(rename = "result")]
    Result(Value),
    /// The handler failed, or the request was unparsable.
    #[serde(rename = "error")]
    Error(String),
}

impl CommandResponse {
    /// Serialises the response for writing to disk.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] when serialisation fails.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec_pretty(self).map_err(|source| EnvelopeError::Encode { source })
    }

    /// Parses a response envelope read from disk.
    ///
    /// An `error` key wins over a `result` key; a document with neither is
    /// treated as a null result, matching what older listeners wrote.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] when the bytes are not a JSON
    /// object.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let mut document: Map<String, Value> =
            serde_json::from_slice(bytes).map_err(|source| EnvelopeError::Malformed { source })?;
        if let Some(error) = document.remove("error") {
            let message = match error {
                Value::String(message) => message,
                other => other.to_string(),
            };
            return Ok(Self::Error(message));
        }
        Ok(Self::Result(
            document.remove("result").unwrap_or(Value::Null),
        ))
    }
}
