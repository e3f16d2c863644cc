// Outbound HTTPS client
//
// One request per call, fully buffered response, no caching. The
// connections-disabled flag is read from the shared runtime config before
// every request.

mod client;
mod fixed;
mod transport;
#[cfg(test)]
mod tests;

pub use client::SecureFetchClient;
pub use fixed::FixedTransport;
pub use transport::{BodyStream, Connection, OutboundRequest, ReqwestTransport, Transport};

use std::collections::HashMap;
use std::fmt;

/// Default request timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Media types used for `Accept` and `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpType {
    Json,
    Text,
    Form,
}

impl HttpType {
    pub fn content_type(&self) -> &'static str {
        match self {
            HttpType::Json => "application/json",
            HttpType::Text => "text/plain",
            HttpType::Form => "application/x-www-form-urlencoded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub body: String,
    pub kind: HttpType,
}

impl RequestBody {
    pub fn new(body: impl Into<String>, kind: HttpType) -> Self {
        Self {
            body: body.into(),
            kind,
        }
    }
}

/// Outbound request description. Built per call and consumed by
/// [`SecureFetchClient::execute`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub uri: String,
    pub body: Option<RequestBody>,
    pub accepts: HttpType,
    pub user_agent: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, uri: impl Into<String>, accepts: HttpType, user_agent: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            body: None,
            accepts,
            user_agent: user_agent.into(),
            method,
            headers: HashMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn get(uri: impl Into<String>, accepts: HttpType, user_agent: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, uri, accepts, user_agent)
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Header values keyed by lowercase header name
    pub headers: HashMap<String, Vec<String>>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Transport failures. Never retried inside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    ConnectionsDisabled,
    InvalidUri(String),
    NonSecureUrl(String),
    /// Neither the success nor the error body stream was available
    NoBodyStream,
    /// Stream ended before the declared Content-Length was read
    ShortRead { got: u64, declared: u64 },
    BodyTooLarge { limit: usize },
    Timeout,
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionsDisabled => write!(f, "connections are disabled"),
            TransportError::InvalidUri(reason) => write!(f, "invalid URI: {}", reason),
            TransportError::NonSecureUrl(uri) => write!(f, "non-secure URL '{}'", uri),
            TransportError::NoBodyStream => write!(f, "no body stream"),
            TransportError::ShortRead { got, declared } => write!(
                f,
                "short read: got {}, wanted {} more (Content-Length {})",
                got,
                declared - got,
                declared
            ),
            TransportError::BodyTooLarge { limit } => {
                write!(f, "response body exceeds {} bytes", limit)
            }
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Io(reason) => write!(f, "I/O error: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(err.to_string()),
        }
    }
}
