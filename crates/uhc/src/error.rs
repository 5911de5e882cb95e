//! Error types for HTTP operations.
//!
//! Construction errors are returned synchronously by [`OperationBuilder`](crate::OperationBuilder)
//! calls. Everything else happens after `execute` has returned and reaches the caller only
//! through the operation's `on_error` handler.

/// What kind of key a [`Error::DuplicateKey`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// A query parameter name.
    Query,
    /// A request header name.
    Header,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query => write!(f, "Query parameter"),
            Self::Header => write!(f, "Header"),
        }
    }
}

/// Errors produced while building or executing an operation.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// A query parameter or header was set twice.
    #[error("{kind} '{key}' already exists")]
    DuplicateKey { kind: KeyKind, key: String },

    /// Buffered and streaming success handlers were both requested.
    #[error("Can't have both buffered and streaming 200 handlers set")]
    ConflictingHandler,

    /// `build()` was called without any success handler.
    #[error("Operation has no 200 handler")]
    MissingSuccessHandler,

    /// Invalid header name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The operation path could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Any other transport failure while sending or reading.
    #[error("HTTP request error: {0}")]
    Request(String),

    /// Transport events arrived out of order.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The operation was cancelled through its handle.
    #[error("Operation was cancelled")]
    Cancelled,

    /// The dispatcher was dropped before the operation reached a terminal event.
    #[error("Operation was abandoned before completion")]
    Abandoned,
}

impl Error {
    /// Create a duplicate query parameter error.
    pub fn duplicate_query(key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            kind: KeyKind::Query,
            key: key.into(),
        }
    }

    /// Create a duplicate header error.
    pub fn duplicate_header(key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            kind: KeyKind::Header,
            key: key.into(),
        }
    }

    /// Create a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether this error was raised by a builder call rather than by the transport.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::DuplicateKey { .. }
                | Self::ConflictingHandler
                | Self::MissingSuccessHandler
                | Self::InvalidHeader(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A specialized Result type for HTTP operations.
pub type Result<T> = std::result::Result<T, Error>;
