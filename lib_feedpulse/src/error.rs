//! # Error Types
//!
//! One enum per failure domain. Only `StreamError` and `SessionError` ever reach
//! callers; rejection by the server and malformed return URLs are recovered
//! inside the session pipeline.

use thiserror::Error;

/// Failures on the push channel.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A payload on a named channel was not valid JSON for its event type.
    /// Terminal for the stream of that event type only.
    #[error("failed to decode '{event}' payload: {source}")]
    Decode {
        /// The channel the payload arrived on.
        event: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The connection dropped or could not be established. Not retried here.
    #[error("push transport failed: {0}")]
    Transport(String),
}

/// Failures of the persistent user slot.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored user record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Failures surfaced by the session validator.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The validation or logout call failed below the protocol level.
    #[error("session API call failed: {0}")]
    Api(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Navigation corrections that could not be carried out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// The return URL carried by the login route does not decode.
    #[error("malformed return url '{0}'")]
    MalformedReturnUrl(String),

    /// The router refused the target.
    #[error("cannot navigate to '{0}'")]
    Unroutable(String),
}

/// Failures constructing HTTP clients.
#[cfg(feature = "transport")]
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("invalid base url (must be absolute): {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}
