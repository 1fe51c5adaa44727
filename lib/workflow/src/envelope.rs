//! Versioned envelope for snapshot files.
//!
//! Everything nodeflow writes to disk is wrapped in an envelope carrying a
//! format version, so that older files can still be recognised and newer
//! ones refused instead of misread.

use nodeflow_core::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The current envelope version.
pub const CURRENT_VERSION: u32 = 1;

/// A versioned wrapper around serialized data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Format version of the payload.
    pub version: u32,
    /// The wrapped payload.
    pub payload: T,
}

/// Envelope whose payload has not been decoded yet.
#[derive(Deserialize)]
struct RawEnvelope {
    version: u32,
    payload: serde_json::Value,
}

impl<T> Envelope<T> {
    /// Wraps a payload with the current version.
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION,
            payload,
        }
    }

    /// Unwraps the envelope.
    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the payload cannot be serialized.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(self).map_err(|e| {
            StoreError::Corrupt {
                key: "envelope".to_string(),
                details: e.to_string(),
            }
            .into()
        })
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decodes an envelope, refusing versions newer than this build knows.
    ///
    /// `key` names the source in error messages.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the bytes are not an envelope, the
    /// version is unsupported or the payload does not decode.
    pub fn from_json_bytes(bytes: &[u8], key: &str) -> Result<Self, StoreError> {
        let corrupt = |details: String| StoreError::Corrupt {
            key: key.to_string(),
            details,
        };
        let raw: RawEnvelope =
            serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
        if raw.version == 0 || raw.version > CURRENT_VERSION {
            return Err(corrupt(format!("unsupported envelope version {}", raw.version)).into());
        }
        let payload = serde_json::from_value(raw.payload).map_err(|e| corrupt(e.to_string()))?;
        Ok(Self {
            version: raw.version,
            payload,
        })
    }
}
