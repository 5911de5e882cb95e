//! Operation descriptor and its builder.
//!
//! An [`Operation`] describes one request together with the handlers that receive its outcome.
//! It is assembled by an [`OperationBuilder`], which rejects conflicting configuration at the
//! offending call, and sealed by [`OperationBuilder::build`]. A built operation has no setters
//! and is consumed by a single `execute` call.
//!
//! # Example
//!
//! ```ignore
//! use uhc::Operation;
//!
//! let op = Operation::builder()
//!     .post()
//!     .path("/api/users")
//!     .query("notify", "true")?
//!     .header("Authorization", "Bearer token")?
//!     .body(r#"{"name":"John"}"#)
//!     .on_200_buffered(|response, body| {
//!         println!("{} -> {} bytes", response.status(), body.len());
//!     })?
//!     .on_finally(|| println!("done"))
//!     .build()?;
//! ```

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

use crate::error::{Error, Result};
use crate::response::Response;

/// Content type used when a body is set without one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// The zero-length chunk a streaming sink receives once the body is complete.
pub const END_OF_STREAM: &[u8] = &[];

/// Handler for a 200 response whose body was buffered in memory.
pub type BufferedHandler = Box<dyn FnOnce(Response, Bytes) + Send>;

/// Per-chunk sink returned by a streaming handler.
pub type ChunkSink = Box<dyn FnMut(&[u8]) + Send>;

/// Factory invoked with the response metadata; returns the sink for body chunks.
pub type StreamingHandler = Box<dyn FnOnce(&Response) -> ChunkSink + Send>;

/// Handler for any status other than 200.
pub type NonSuccessHandler = Box<dyn FnOnce(Response, Bytes) + Send>;

/// Handler for transport-level failures.
pub type ErrorHandler = Box<dyn FnOnce(Error) + Send>;

/// Cleanup hook run after every terminal outcome.
pub type FinallyHandler = Box<dyn FnOnce() + Send>;

/// Request body supplied as a stream of byte chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// HTTP request methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET method.
    #[default]
    Get,
    /// HTTP POST method.
    Post,
    /// HTTP PUT method.
    Put,
    /// HTTP DELETE method.
    Delete,
}

impl Method {
    /// The method name as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The body of a request.
#[derive(Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// In-memory text body.
    Text {
        /// The body text.
        text: String,
        /// Value for the Content-Type header.
        content_type: String,
    },
    /// Body read from a stream while the request is sent.
    Stream {
        /// Source of body chunks.
        stream: BodyStream,
        /// Value for the Content-Type header.
        content_type: String,
    },
}

impl RequestBody {
    /// Content type of the body, if there is one.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Text { content_type, .. } | Self::Stream { content_type, .. } => {
                Some(content_type)
            }
        }
    }

    /// Check if no body is set.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text { text, content_type } => f
                .debug_struct("Text")
                .field("len", &text.len())
                .field("content_type", content_type)
                .finish(),
            Self::Stream { content_type, .. } => f
                .debug_struct("Stream")
                .field("content_type", content_type)
                .finish_non_exhaustive(),
        }
    }
}

/// The single success handler an operation carries.
pub enum SuccessHandler {
    /// Deliver the whole body at completion.
    Buffered(BufferedHandler),
    /// Deliver the body chunk by chunk to a sink created from the response metadata.
    Streaming(StreamingHandler),
}

impl SuccessHandler {
    /// Check if this is the streaming variant.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

impl std::fmt::Debug for SuccessHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(_) => f.write_str("Buffered"),
            Self::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

/// Request half of an operation: what the transport sends.
#[derive(Debug, Default)]
pub struct RequestSpec {
    /// The HTTP method.
    pub method: Method,
    /// Path, or absolute URL, of the request.
    pub path: String,
    /// Query parameters in insertion order.
    pub query: Vec<(String, Vec<String>)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
}

/// Outcome half of an operation: the handlers the dispatcher invokes.
pub struct Handlers {
    pub(crate) success: SuccessHandler,
    pub(crate) on_non_success: NonSuccessHandler,
    pub(crate) on_error: ErrorHandler,
    pub(crate) on_finally: Option<FinallyHandler>,
}

impl Handlers {
    /// Check if the success handler is the streaming variant.
    pub fn is_streaming(&self) -> bool {
        self.success.is_streaming()
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("success", &self.success)
            .field("on_finally", &self.on_finally.is_some())
            .finish_non_exhaustive()
    }
}

/// A sealed request plus its outcome handlers.
#[derive(Debug)]
pub struct Operation {
    request: RequestSpec,
    handlers: Handlers,
}

impl Operation {
    /// Create a builder for a new operation.
    pub fn builder() -> OperationBuilder {
        OperationBuilder::new()
    }

    /// Get the HTTP method.
    pub fn method(&self) -> Method {
        self.request.method
    }

    /// Get the request path.
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Get all query parameters in insertion order.
    pub fn query(&self) -> &[(String, Vec<String>)] {
        &self.request.query
    }

    /// Get the values of one query parameter.
    pub fn query_values(&self, key: &str) -> Option<&[String]> {
        self.request
            .query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    /// Get the request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.request.headers
    }

    /// Get the request body.
    pub fn body(&self) -> &RequestBody {
        &self.request.body
    }

    /// Check if the operation streams its 200 body.
    pub fn is_streaming(&self) -> bool {
        self.handlers.is_streaming()
    }

    /// Check if a cleanup hook is attached.
    pub fn has_finally(&self) -> bool {
        self.handlers.on_finally.is_some()
    }

    /// Split into the request to send and the handlers that receive the outcome.
    pub fn into_parts(self) -> (RequestSpec, Handlers) {
        (self.request, self.handlers)
    }
}

/// Builder for [`Operation`].
///
/// Infallible setters return `Self`; setters that can violate an invariant return
/// `Result<Self>` so chains read naturally with `?`.
pub struct OperationBuilder {
    request: RequestSpec,
    success: Option<SuccessHandler>,
    on_non_success: NonSuccessHandler,
    on_error: ErrorHandler,
    on_finally: Option<FinallyHandler>,
}

impl Default for OperationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationBuilder {
    /// Create a builder for `GET /` with default logging handlers.
    pub fn new() -> Self {
        Self {
            request: RequestSpec {
                path: "/".to_string(),
                ..RequestSpec::default()
            },
            success: None,
            on_non_success: Box::new(|response: Response, _body: Bytes| {
                tracing::warn!(target: "uhc::dispatch", "Unhandled HTTP {} response", response.status());
            }),
            on_error: Box::new(|error: Error| {
                tracing::error!(target: "uhc::dispatch", "Unhandled error while reading HTTP response: {}", error);
            }),
            on_finally: None,
        }
    }

    /// Use the GET method.
    pub fn get(self) -> Self {
        self.method(Method::Get)
    }

    /// Use the POST method.
    pub fn post(self) -> Self {
        self.method(Method::Post)
    }

    /// Use the PUT method.
    pub fn put(self) -> Self {
        self.method(Method::Put)
    }

    /// Use the DELETE method.
    pub fn delete(self) -> Self {
        self.method(Method::Delete)
    }

    /// Set the method. The last call wins.
    pub fn method(mut self, method: Method) -> Self {
        self.request.method = method;
        self
    }

    /// Set the path, replacing any previous one.
    ///
    /// Relative paths are resolved against the client's base URL; absolute URLs are used as is.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.request.path = path.into();
        self
    }

    /// Add a single-valued query parameter.
    pub fn query(self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let value: String = value.into();
        self.query_values(key, [value])
    }

    /// Add a query parameter with several values, sent in the given order.
    pub fn query_values<I, V>(mut self, key: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        if self.request.query.iter().any(|(k, _)| *k == key) {
            return Err(Error::duplicate_query(key));
        }
        let values = values.into_iter().map(Into::into).collect();
        self.request.query.push((key, values));
        Ok(self)
    }

    /// Add a request header. Names compare case-insensitively.
    pub fn header(mut self, key: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(key.as_bytes())?;
        if self.request.headers.contains_key(&name) {
            return Err(Error::duplicate_header(key));
        }
        let value = HeaderValue::from_bytes(value.as_bytes())?;
        self.request.headers.insert(name, value);
        Ok(self)
    }

    /// Set a text body with the default JSON content type.
    pub fn body(self, text: impl Into<String>) -> Self {
        self.body_with_type(text, DEFAULT_CONTENT_TYPE)
    }

    /// Set a text body, replacing any stream body.
    pub fn body_with_type(mut self, text: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.request.body = RequestBody::Text {
            text: text.into(),
            content_type: content_type.into(),
        };
        self
    }

    /// Set a streamed body with the default JSON content type.
    pub fn body_stream<S>(self, stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        self.body_stream_with_type(stream, DEFAULT_CONTENT_TYPE)
    }

    /// Set a streamed body, replacing any text body.
    pub fn body_stream_with_type<S>(mut self, stream: S, content_type: impl Into<String>) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        self.request.body = RequestBody::Stream {
            stream: Box::pin(stream),
            content_type: content_type.into(),
        };
        self
    }

    /// Receive a 200 response with its whole body.
    ///
    /// Fails if a streaming handler is already set.
    pub fn on_200_buffered<F>(mut self, handler: F) -> Result<Self>
    where
        F: FnOnce(Response, Bytes) + Send + 'static,
    {
        if matches!(self.success, Some(SuccessHandler::Streaming(_))) {
            return Err(Error::ConflictingHandler);
        }
        self.success = Some(SuccessHandler::Buffered(Box::new(handler)));
        Ok(self)
    }

    /// Receive a 200 response body chunk by chunk.
    ///
    /// `factory` runs once the headers are in and returns the sink for every chunk. The sink
    /// sees [`END_OF_STREAM`] last. Fails if a buffered handler is already set.
    pub fn on_200_streaming<F, S>(mut self, factory: F) -> Result<Self>
    where
        F: FnOnce(&Response) -> S + Send + 'static,
        S: FnMut(&[u8]) + Send + 'static,
    {
        if matches!(self.success, Some(SuccessHandler::Buffered(_))) {
            return Err(Error::ConflictingHandler);
        }
        self.success = Some(SuccessHandler::Streaming(Box::new(move |response: &Response| {
            Box::new(factory(response)) as ChunkSink
        })));
        Ok(self)
    }

    /// Receive any response whose status is not 200.
    pub fn on_non_success<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(Response, Bytes) + Send + 'static,
    {
        self.on_non_success = Box::new(handler);
        self
    }

    /// Receive transport failures (connect, timeout, cancellation).
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.on_error = Box::new(handler);
        self
    }

    /// Run after whichever terminal handler fired.
    pub fn on_finally<F>(mut self, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_finally = Some(Box::new(handler));
        self
    }

    /// Seal the operation. Fails if no 200 handler was set.
    pub fn build(self) -> Result<Operation> {
        let success = self.success.ok_or(Error::MissingSuccessHandler)?;
        Ok(Operation {
            request: self.request,
            handlers: Handlers {
                success,
                on_non_success: self.on_non_success,
                on_error: self.on_error,
                on_finally: self.on_finally,
            },
        })
    }
}

impl std::fmt::Debug for OperationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationBuilder")
            .field("request", &self.request)
            .field("success", &self.success)
            .finish_non_exhaustive()
    }
}
