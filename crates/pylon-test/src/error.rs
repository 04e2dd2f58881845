//! Test error types.

use thiserror::Error;

/// Errors raised while building test doubles.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request URI did not parse.
    #[error("invalid request URI: {0}")]
    InvalidUri(String),

    /// A header name or value was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The HTTP method was rejected.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
}
