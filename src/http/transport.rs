use super::{HttpMethod, TransportError};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Url};
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Response body as a byte stream.
pub type BodyStream = Box<dyn AsyncRead + Send + Unpin>;

/// Request after validation, with every header resolved.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub method: HttpMethod,
    /// Applied in order; a later entry replaces an earlier one with the same name
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Used as both connect and read timeout
    pub timeout: Duration,
}

impl OutboundRequest {
    /// Effective value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Opened connection with the status line and headers already received.
pub trait Connection: Send {
    fn status(&self) -> u16;

    /// Declared Content-Length, if the peer sent one.
    fn content_length(&self) -> Option<u64>;

    fn headers(&self) -> HashMap<String, Vec<String>>;

    /// Body of a successful response. Fails for error statuses.
    fn input_stream(&mut self) -> io::Result<BodyStream>;

    /// Body of an error response, if any.
    fn error_stream(&mut self) -> Option<BodyStream>;
}

/// Opens connections. Swapped out in tests to observe socket usage.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: OutboundRequest) -> Result<Box<dyn Connection>, TransportError>;
}

/// reqwest-backed transport. A client is built per request so the
/// connect timeout follows the caller's timeout.
#[derive(Debug, Default, Clone)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn open(&self, request: OutboundRequest) -> Result<Box<dyn Connection>, TransportError> {
        let client = Client::builder()
            .connect_timeout(request.timeout)
            .timeout(request.timeout)
            .redirect(https_only_redirects())
            .build()
            .map_err(|e| TransportError::Io(format!("failed to build HTTP client: {}", e)))?;

        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Io(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Io(format!("invalid value for header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let mut builder = client.request(method, request.url).headers(headers);
        if let Some(body) = request.body {
            // Sized body: sent with Content-Length, never chunked
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        Ok(Box::new(ReqwestConnection::new(response)))
    }
}

/// Redirect hops allowed before the request fails.
const MAX_REDIRECTS: usize = 10;

/// Follow only redirects that stay on https. A hop to any other scheme is
/// not followed; the 3xx response itself is returned to the caller.
fn https_only_redirects() -> Policy {
    Policy::custom(|attempt| {
        if attempt.url().scheme() != "https" {
            attempt.stop()
        } else if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Io(err.to_string())
    }
}

struct ReqwestConnection {
    status: u16,
    content_length: Option<u64>,
    headers: HashMap<String, Vec<String>>,
    response: Option<reqwest::Response>,
}

impl ReqwestConnection {
    fn new(response: reqwest::Response) -> Self {
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        Self {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            headers,
            response: Some(response),
        }
    }

    fn take_stream(&mut self) -> Option<BodyStream> {
        let response = self.response.take()?;
        let stream = response.bytes_stream().map_err(io::Error::other);
        Some(Box::new(StreamReader::new(Box::pin(stream))))
    }
}

impl Connection for ReqwestConnection {
    fn status(&self) -> u16 {
        self.status
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    fn headers(&self) -> HashMap<String, Vec<String>> {
        self.headers.clone()
    }

    fn input_stream(&mut self) -> io::Result<BodyStream> {
        if self.status >= 400 {
            return Err(io::Error::other(format!("server returned HTTP {}", self.status)));
        }
        self.take_stream()
            .ok_or_else(|| io::Error::other("response body already consumed"))
    }

    fn error_stream(&mut self) -> Option<BodyStream> {
        if self.status >= 400 {
            self.take_stream()
        } else {
            None
        }
    }
}
