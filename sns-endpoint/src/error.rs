//! Error types for the sns-endpoint crate.

use std::net::SocketAddr;

/// Errors raised while pulling a field set out of an inbound delivery.
///
/// These never reach the sender: the dispatcher has already chosen its
/// response, so an extraction failure only means no callback fires.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The `Content-Length` header is absent
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// The `Content-Length` header is not a non-negative integer
    #[error("invalid Content-Length header: {0:?}")]
    InvalidContentLength(String),

    /// Fewer body bytes arrived than `Content-Length` announced
    #[error("body truncated: expected {expected} bytes, got {actual}")]
    TruncatedBody {
        /// Length announced by the header
        expected: usize,
        /// Length actually received
        actual: usize,
    },

    /// The body is not valid JSON
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is JSON, but not an object
    #[error("JSON body is not an object")]
    NotAnObject,

    /// A required string field is absent or has the wrong type
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Errors from the outbound subscription confirmation request.
#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    /// `SubscribeURL` could not be parsed as an absolute URL
    #[error("invalid SubscribeURL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The GET request failed at the transport level
    #[error("confirmation request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Invalid listener configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("max_header_bytes must be at least {min}, got {actual}")]
    HeaderLimitTooSmall { min: usize, actual: usize },
}

/// Errors that stop the listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be resolved
    #[error("invalid listen address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Binding the listening socket failed
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: hyper::Error,
    },

    /// The listener failed while accepting or serving connections
    #[error("server error: {0}")]
    Serve(#[source] hyper::Error),

    /// The configuration was rejected before binding
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The background listener task panicked or was cancelled
    #[error("listener task failed: {0}")]
    Task(String),
}

/// Convenience type alias for Results using ServerError.
pub type Result<T> = std::result::Result<T, ServerError>;
