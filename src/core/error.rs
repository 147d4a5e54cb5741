//! Error types for IIO context discovery
//!
//! None of these errors travel through the discovery event path: the scanner
//! logs them and degrades to "no contexts this cycle". They are returned by
//! the lower-level scan backends and by URI parsing.

use thiserror::Error;

/// Main error type for context discovery
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The scan context for a transport could not be created
    #[error("Transport '{backend}' unavailable: {reason}")]
    TransportUnavailable { backend: String, reason: String },

    /// The enumeration call itself reported an error
    #[error("Scan failed on transport '{backend}': {reason}")]
    ScanFailed { backend: String, reason: String },

    /// A context URI was empty or malformed
    #[error("Invalid context URI: '{0}'")]
    InvalidUri(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(String),

    /// The background scan worker could not be spawned or went away
    #[error("Scan worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl DiscoveryError {
    /// Name of the transport this error relates to, if any
    pub fn backend(&self) -> Option<&str> {
        match self {
            DiscoveryError::TransportUnavailable { backend, .. }
            | DiscoveryError::ScanFailed { backend, .. } => Some(backend),
            _ => None,
        }
    }

    /// Shorthand for a transport-open failure
    pub fn transport(backend: &str, reason: impl Into<String>) -> Self {
        DiscoveryError::TransportUnavailable {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an enumeration failure
    pub fn scan(backend: &str, reason: impl Into<String>) -> Self {
        DiscoveryError::ScanFailed {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DiscoveryError>;

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io(err.to_string())
    }
}
