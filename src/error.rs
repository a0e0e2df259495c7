//! Error types
//!
//! Provider implementations report failures as [`BoxError`]; everything the
//! crate itself returns goes through [`Error`].

use crate::rtc::StreamType;

/// Error type handed back by provider and legacy callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registration attempted before a camera component was attached
    #[error("Unexpected state, camera not loaded")]
    NotLoaded,

    /// A capability check failed and the registry is configured to abort selection
    #[error("capability check failed for {stream_source}: {source}")]
    CapabilityCheck {
        stream_source: String,
        #[source]
        source: BoxError,
    },

    /// The selected provider failed to negotiate; the provider's error is kept as-is
    #[error(transparent)]
    Negotiation(BoxError),

    /// The camera's frontend stream type is not WebRTC
    #[error("Camera does not support WebRTC, frontend_stream_type={stream_type}")]
    Unsupported {
        entity_id: String,
        stream_type: StreamType,
    },

    /// No camera with this entity id is attached to the component
    #[error("Camera not found: {0}")]
    EntityNotFound(String),

    /// A command could not be decoded
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] serde_json::Error),
}

impl Error {
    /// Take back the provider's original error from a negotiation failure
    pub fn into_negotiation_source(self) -> Option<BoxError> {
        match self {
            Error::Negotiation(source) => Some(source),
            _ => None,
        }
    }

    /// Whether this error came from the provider during negotiation
    pub fn is_negotiation(&self) -> bool {
        matches!(self, Error::Negotiation(_))
    }
}
