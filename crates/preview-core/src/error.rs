//! Error types for preview monitoring
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for preview monitoring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed transport-level cause, kept as-is so callers can downcast it
pub type TransportCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for preview monitoring
#[derive(Error, Debug)]
pub enum Error {
    /// No build identity could be read from the running executable
    #[error("Could not extract a build identity from the running executable")]
    IdentityUnavailable,

    /// The configured project handle is not `<account>/<project>`
    #[error(
        "Invalid full handle format: {0}. Expected format: account-handle/project-handle."
    )]
    MalformedProjectHandle(String),

    /// The server rejected the credential
    #[error("{0}")]
    Unauthorized(String),

    /// The credential lacks permission for the project
    #[error("{0}")]
    Forbidden(String),

    /// The server answered with an undocumented status
    #[error("The latest preview could not be fetched due to an unknown response: {0}.")]
    UnknownServerError(u16),

    /// Network-level failure (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(#[source] TransportCause),

    /// The server reported an update without a usable install location
    #[error("Invalid location reference: {0:?}")]
    InvalidLocationReference(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ignored-preview store errors
    #[error("Store error: {0}")]
    Store(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a malformed project handle error
    pub fn malformed_handle(handle: impl Into<String>) -> Self {
        Self::MalformedProjectHandle(handle.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Wrap a transport failure without altering it
    pub fn transport(cause: impl Into<TransportCause>) -> Self {
        Self::Transport(cause.into())
    }

    /// Create an invalid location error
    pub fn invalid_location(location: impl Into<String>) -> Self {
        Self::InvalidLocationReference(location.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether a later attempt may succeed without any change on the caller's side
    ///
    /// Transport failures and 5xx responses are transient. Credential,
    /// configuration and contract errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::UnknownServerError(code) => (500..=599).contains(code),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::transport(std::io::Error::other("reset")).is_transient());
        assert!(Error::UnknownServerError(503).is_transient());
        assert!(!Error::UnknownServerError(418).is_transient());
        assert!(!Error::unauthorized("bad token").is_transient());
        assert!(!Error::IdentityUnavailable.is_transient());
    }

    #[test]
    fn test_server_messages_are_verbatim() {
        assert_eq!(Error::forbidden("no access").to_string(), "no access");
        assert_eq!(Error::unauthorized("expired").to_string(), "expired");
    }

    #[test]
    fn test_transport_cause_is_preserved() {
        let err = Error::transport(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "deadline",
        ));
        let source = std::error::Error::source(&err).expect("source kept");
        let io = source
            .downcast_ref::<std::io::Error>()
            .expect("original error type kept");
        assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);
    }
}
