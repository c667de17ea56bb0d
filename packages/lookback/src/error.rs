//! Error types for the Lookback bridge
//!
//! Property-style operations on the façade never fail; these errors only come
//! out of the seams where a binding layer hands data in (event decoding,
//! configuration) or waits on background work.

use thiserror::Error;

/// Result type for Lookback bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the Lookback bridge
#[derive(Debug, Error)]
pub enum Error {
    /// Errors related to JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background task panicked or was cancelled
    #[error("Tokio error: {0}")]
    Tokio(#[from] tokio::task::JoinError),

    /// The host environment could not answer a query
    #[error("Environment error: {0}")]
    Environment(String),

    /// A native event name this bridge does not know about
    #[error("Unknown native event: {0}")]
    UnknownEvent(String),

    /// A native event carried a payload of the wrong shape
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl Error {
    /// Build an environment error from anything printable
    pub fn environment(reason: impl Into<String>) -> Self {
        Self::Environment(reason.into())
    }
}
