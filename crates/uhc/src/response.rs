//! Response metadata: status code and headers.
//!
//! A [`Response`] is assembled by the dispatcher as the transport reports the status line and
//! then the header block. Once built it is never modified; the same value is handed to the
//! streaming factory and to the terminal callback.

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

/// Status and headers of an HTTP response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
}

impl Response {
    /// Create a builder for response metadata.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Check if the status is exactly 200, the only status routed to success handlers.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the first value of a header, if it is valid UTF-8.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get every value of a header, in the order received.
    pub fn header_values(&self, name: impl AsRef<str>) -> Vec<&str> {
        self.headers
            .get_all(name.as_ref())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Get the Content-Type header value.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Incremental builder for [`Response`].
#[derive(Clone, Debug, Default)]
pub struct ResponseBuilder {
    status: u16,
    headers: HeaderMap,
}

impl ResponseBuilder {
    /// Record the status code.
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Replace the whole header block.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Append one header value. Invalid names or values are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => {
                tracing::warn!(target: "uhc::response", "Skipping invalid response header '{}'", name);
            }
        }
        self
    }

    /// Seal the metadata.
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
        }
    }
}
