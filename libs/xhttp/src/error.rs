use std::time::Duration;
use thiserror::Error;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// HTTP client error types
///
/// Errors raised while constructing a client are returned by
/// [`HttpClientBuilder::build`](crate::HttpClientBuilder::build); every other
/// error is delivered through [`Response::error`](crate::Response::error) on
/// the response a request produced.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Client construction was attempted with an incomplete configuration
    #[error("Invalid client configuration: {0}")]
    Configuration(String),

    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Invalid URL (failed to parse)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field contains
    /// a diagnostic message intended for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed to parse
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// URL scheme other than `http` or `https`
    #[error("URL scheme '{scheme}' not supported")]
    InvalidScheme {
        /// The URL scheme that was rejected
        scheme: String,
    },

    /// Query parameters could not be form-encoded
    #[error("Query encoding failed: {0}")]
    QueryEncode(#[from] serde_urlencoded::ser::Error),

    /// Request body could not be serialized to JSON
    #[error("Failed to serialize request body: {0}")]
    RequestBody(#[source] serde_json::Error),

    /// Request timed out
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (network, connection, DNS, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Redirect chain exceeded the configured limit
    #[error("Stopped after {0} redirects")]
    TooManyRedirects(usize),

    /// Redirect-check callback refused to follow a redirect
    #[error("Redirect to '{location}' rejected: {reason}")]
    RedirectRejected {
        /// Target of the refused redirect
        location: String,
        /// Reason returned by the callback
        reason: String,
    },

    /// Response body could not be fully read
    #[error("Failed to read response body: {0}")]
    Read(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Response body is not a JSON document
    #[error("Response body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}
