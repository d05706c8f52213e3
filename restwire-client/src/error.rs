//! Client-side error types.
//!
//! This module provides [`ClientError`], the error type for everything that can
//! go wrong while a request travels through an [`HttpClient`](crate::HttpClient)
//! pipeline.

use std::time::Duration;

/// Errors raised while sending a request through a client pipeline.
///
/// Errors produced by handlers, token getters and transports are returned to
/// the caller of [`HttpClient::send`](crate::HttpClient::send) unchanged.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error (connection failed, body read failed, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured client timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The authorization token could not be obtained.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// A request could not be built (invalid header, invalid uri, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A delegating or primary handler rejected the request.
    #[error("handler error: {0}")]
    Handler(String),
}

impl ClientError {
    /// Create an authorization error.
    pub fn authorization<S: Into<String>>(message: S) -> Self {
        ClientError::Authorization(message.into())
    }

    /// Create a handler error.
    pub fn handler<S: Into<String>>(message: S) -> Self {
        ClientError::Handler(message.into())
    }

    /// Create a protocol error.
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        ClientError::Protocol(message.into())
    }

    /// Create a transport error.
    pub fn transport<S: Into<String>>(message: S) -> Self {
        ClientError::Transport(message.into())
    }

    /// Get the error message, if the variant carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            ClientError::Transport(msg)
            | ClientError::Authorization(msg)
            | ClientError::Protocol(msg)
            | ClientError::Handler(msg) => Some(msg),
            ClientError::Timeout(_) => None,
        }
    }

    /// Returns whether the request was aborted by the client timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }
}

impl From<http::Error> for ClientError {
    fn from(err: http::Error) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for ClientError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        ClientError::Protocol(format!("invalid header value: {}", err))
    }
}
