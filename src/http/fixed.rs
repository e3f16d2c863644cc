use super::transport::{BodyStream, Connection, OutboundRequest, Transport};
use super::TransportError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Transport answering from a fixed route table, without touching the network.
///
/// Used by tests and offline setups. Unrouted URLs fail like a refused
/// connection.
#[derive(Default)]
pub struct FixedTransport {
    routes: DashMap<String, (u16, String)>,
    opened: AtomicUsize,
}

impl FixedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `url` with `status` and `body`.
    pub fn route(&self, url: impl Into<String>, status: u16, body: impl Into<String>) -> &Self {
        self.routes.insert(url.into(), (status, body.into()));
        self
    }

    /// Number of connections opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FixedTransport {
    async fn open(&self, request: OutboundRequest) -> Result<Box<dyn Connection>, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        let (status, body) = self
            .routes
            .get(request.url.as_str())
            .map(|route| route.value().clone())
            .ok_or_else(|| TransportError::Io(format!("connection refused: {}", request.url)))?;

        Ok(Box::new(FixedConnection {
            status,
            length: body.len() as u64,
            body: Some(body.into_bytes()),
        }))
    }
}

struct FixedConnection {
    status: u16,
    length: u64,
    body: Option<Vec<u8>>,
}

impl Connection for FixedConnection {
    fn status(&self) -> u16 {
        self.status
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.length)
    }

    fn headers(&self) -> HashMap<String, Vec<String>> {
        HashMap::new()
    }

    fn input_stream(&mut self) -> io::Result<BodyStream> {
        if self.status >= 400 {
            return Err(io::Error::other(format!("server returned HTTP {}", self.status)));
        }
        self.body
            .take()
            .map(|body| Box::new(io::Cursor::new(body)) as BodyStream)
            .ok_or_else(|| io::Error::other("response body already consumed"))
    }

    fn error_stream(&mut self) -> Option<BodyStream> {
        if self.status < 400 {
            return None;
        }
        self.body
            .take()
            .map(|body| Box::new(io::Cursor::new(body)) as BodyStream)
    }
}
