use super::*;
use crate::config::{new_runtime_config, SharedRuntimeConfig};
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Scripted response served by [`StubTransport`].
#[derive(Clone)]
struct Scripted {
    status: u16,
    content_length: Option<u64>,
    /// None makes the success stream fail
    body: Option<Vec<u8>>,
    error_body: Option<Vec<u8>>,
    trickle: bool,
}

impl Scripted {
    fn ok(body: &str) -> Self {
        Self {
            status: 200,
            content_length: Some(body.len() as u64),
            body: Some(body.as_bytes().to_vec()),
            error_body: None,
            trickle: false,
        }
    }
}

/// Delivers one byte per read.
struct Trickle {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for Trickle {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.pos < self.data.len() && buf.remaining() > 0 {
            let byte = self.data[self.pos];
            buf.put_slice(&[byte]);
            self.pos += 1;
        }
        Poll::Ready(Ok(()))
    }
}

struct StubConnection {
    scripted: Scripted,
}

impl StubConnection {
    fn stream(&self, data: Vec<u8>) -> BodyStream {
        if self.scripted.trickle {
            Box::new(Trickle { data, pos: 0 })
        } else {
            Box::new(io::Cursor::new(data))
        }
    }
}

impl Connection for StubConnection {
    fn status(&self) -> u16 {
        self.scripted.status
    }

    fn content_length(&self) -> Option<u64> {
        self.scripted.content_length
    }

    fn headers(&self) -> HashMap<String, Vec<String>> {
        HashMap::from([("content-type".to_string(), vec!["application/json".to_string()])])
    }

    fn input_stream(&mut self) -> io::Result<BodyStream> {
        match self.scripted.body.clone() {
            Some(data) => Ok(self.stream(data)),
            None => Err(io::Error::other(format!("server returned HTTP {}", self.scripted.status))),
        }
    }

    fn error_stream(&mut self) -> Option<BodyStream> {
        self.scripted.error_body.clone().map(|data| self.stream(data))
    }
}

/// Counts opened connections and records the last request.
struct StubTransport {
    scripted: Scripted,
    opened: AtomicUsize,
    last_request: Mutex<Option<OutboundRequest>>,
}

impl StubTransport {
    fn new(scripted: Scripted) -> Arc<Self> {
        Arc::new(Self {
            scripted,
            opened: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> OutboundRequest {
        self.last_request.lock().unwrap().clone().unwrap()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn open(&self, request: OutboundRequest) -> Result<Box<dyn Connection>, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        Ok(Box::new(StubConnection {
            scripted: self.scripted.clone(),
        }))
    }
}

fn client(transport: Arc<StubTransport>) -> (SecureFetchClient, SharedRuntimeConfig) {
    let runtime_config = new_runtime_config();
    runtime_config.write().unwrap().no_connections = false;
    let client = SecureFetchClient::with_transport(runtime_config.clone(), transport);
    (client, runtime_config)
}

fn get(uri: &str) -> HttpRequest {
    HttpRequest::get(uri, HttpType::Json, "skinrelay-test")
}

#[tokio::test]
async fn test_successful_get() {
    let transport = StubTransport::new(Scripted::ok(r#"{"id":"abc"}"#));
    let (client, _) = client(transport.clone());

    let response = client.execute(get("https://api.example.com/profile")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"id":"abc"}"#);
    assert!(response.is_success());
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    assert_eq!(transport.opened(), 1);
}

#[tokio::test]
async fn test_rejects_non_https_without_connecting() {
    let transport = StubTransport::new(Scripted::ok("{}"));
    let (client, _) = client(transport.clone());

    for uri in ["http://api.example.com/profile", "ftp://api.example.com/x", "HTTPS:/"] {
        let result = client.execute(get(uri)).await;
        assert!(result.is_err(), "{} should be rejected", uri);
    }

    let err = client.execute(get("http://api.example.com/profile")).await.unwrap_err();
    assert_eq!(err, TransportError::NonSecureUrl("http://api.example.com/profile".to_string()));
    assert!(err.to_string().contains("non-secure URL"));
    assert_eq!(transport.opened(), 0);
}

#[tokio::test]
async fn test_invalid_uri() {
    let transport = StubTransport::new(Scripted::ok("{}"));
    let (client, _) = client(transport.clone());

    let err = client.execute(get("not a uri")).await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidUri(_)));
    assert_eq!(transport.opened(), 0);
}

#[tokio::test]
async fn test_connections_disabled_flag_read_per_request() {
    let transport = StubTransport::new(Scripted::ok("{}"));
    let (client, runtime_config) = client(transport.clone());

    runtime_config.write().unwrap().no_connections = true;
    let err = client.execute(get("https://api.example.com/")).await.unwrap_err();
    assert_eq!(err, TransportError::ConnectionsDisabled);
    assert_eq!(transport.opened(), 0);

    runtime_config.write().unwrap().no_connections = false;
    assert!(client.execute(get("https://api.example.com/")).await.is_ok());
    assert_eq!(transport.opened(), 1);
}

#[tokio::test]
async fn test_short_read_reports_both_lengths() {
    let mut scripted = Scripted::ok("abcd");
    scripted.content_length = Some(10);
    let (client, _) = client(StubTransport::new(scripted));

    let err = client.execute(get("https://api.example.com/")).await.unwrap_err();

    assert_eq!(err, TransportError::ShortRead { got: 4, declared: 10 });
    let message = err.to_string();
    assert!(message.contains("short read: got 4, wanted 6 more"));
    assert!(message.contains("10"));
}

#[tokio::test]
async fn test_reads_across_partial_chunks() {
    let mut scripted = Scripted::ok("eyJ0ZXh0dXJlcyI6e319");
    scripted.trickle = true;
    let (client, _) = client(StubTransport::new(scripted));

    let response = client.execute(get("https://api.example.com/")).await.unwrap();
    assert_eq!(response.body, "eyJ0ZXh0dXJlcyI6e319");
}

#[tokio::test]
async fn test_reads_only_declared_length() {
    let mut scripted = Scripted::ok("abcdef");
    scripted.content_length = Some(3);
    let (client, _) = client(StubTransport::new(scripted));

    let response = client.execute(get("https://api.example.com/")).await.unwrap();
    assert_eq!(response.body, "abc");
}

#[tokio::test]
async fn test_missing_content_length_reads_to_end() {
    let mut scripted = Scripted::ok("chunked body");
    scripted.content_length = None;
    let (client, _) = client(StubTransport::new(scripted));

    let response = client.execute(get("https://api.example.com/")).await.unwrap();
    assert_eq!(response.body, "chunked body");
}

#[tokio::test]
async fn test_body_limit_enforced() {
    let scripted = Scripted::ok("0123456789");
    let (client, runtime_config) = client(StubTransport::new(scripted));
    runtime_config.write().unwrap().max_response_bytes = 4;

    let err = client.execute(get("https://api.example.com/")).await.unwrap_err();
    assert_eq!(err, TransportError::BodyTooLarge { limit: 4 });
}

#[tokio::test]
async fn test_falls_back_to_error_stream() {
    let error_body = r#"{"errorMessage":"Not Found"}"#;
    let scripted = Scripted {
        status: 404,
        content_length: Some(error_body.len() as u64),
        body: None,
        error_body: Some(error_body.as_bytes().to_vec()),
        trickle: false,
    };
    let (client, _) = client(StubTransport::new(scripted));

    let response = client.execute(get("https://api.example.com/")).await.unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.body, error_body);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_no_body_stream() {
    let scripted = Scripted {
        status: 500,
        content_length: Some(0),
        body: None,
        error_body: None,
        trickle: false,
    };
    let (client, _) = client(StubTransport::new(scripted));

    let err = client.execute(get("https://api.example.com/")).await.unwrap_err();
    assert_eq!(err, TransportError::NoBodyStream);
    assert_eq!(err.to_string(), "no body stream");
}

#[tokio::test]
async fn test_request_headers_and_body() {
    let transport = StubTransport::new(Scripted::ok("{}"));
    let (client, _) = client(transport.clone());

    let request = HttpRequest::new(HttpMethod::Post, "https://api.example.com/generate", HttpType::Json, "skinrelay/1.0")
        .with_body(RequestBody::new("url=https%3A%2F%2Fexample.com%2Fskin.png", HttpType::Form))
        .with_header("Authorization", "Bearer token")
        .with_timeout_ms(2500);
    client.execute(request).await.unwrap();

    let sent = transport.last_request();
    assert_eq!(sent.method, HttpMethod::Post);
    assert_eq!(sent.header("accept"), Some("application/json"));
    assert_eq!(sent.header("user-agent"), Some("skinrelay/1.0"));
    assert_eq!(sent.header("authorization"), Some("Bearer token"));
    assert_eq!(sent.header("cache-control"), Some("no-cache"));
    assert_eq!(sent.header("content-type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(sent.header("content-length"), Some("40"));
    assert_eq!(sent.body.as_deref().map(|b| b.len()), Some(40));
    assert_eq!(sent.timeout, std::time::Duration::from_millis(2500));
}

#[tokio::test]
async fn test_get_has_no_body_headers() {
    let transport = StubTransport::new(Scripted::ok("{}"));
    let (client, _) = client(transport.clone());

    client.execute(get("https://api.example.com/")).await.unwrap();

    let sent = transport.last_request();
    assert!(sent.body.is_none());
    assert_eq!(sent.header("content-type"), None);
    assert_eq!(sent.header("content-length"), None);
}
