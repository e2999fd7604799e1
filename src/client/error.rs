//! Error type shared by compute clients.

use thiserror::Error;

use super::ParamKind;

/// Errors raised by a [`super::ComputeClient`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// Raised when the HTTP request could not be sent or read.
    #[error("transport error: {message}")]
    Transport {
        /// Message from the HTTP client.
        message: String,
    },
    /// Raised when the provider rejects a request.
    #[error("provider returned status {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error text returned by the provider.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("unexpected response from provider: {message}")]
    Decode {
        /// Decoder diagnostic.
        message: String,
    },
    /// Raised when a label or identifier has no match at the provider.
    #[error("{kind} '{value}' not found")]
    NotFound {
        /// Kind of parameter being resolved.
        kind: ParamKind,
        /// Label or identifier that failed to resolve.
        value: String,
    },
}
