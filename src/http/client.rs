use super::transport::{BodyStream, OutboundRequest, ReqwestTransport, Transport};
use super::{HttpRequest, HttpResponse, TransportError};
use crate::config::SharedRuntimeConfig;
use reqwest::Url;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// HTTPS-only client returning fully buffered responses.
///
/// Every call re-reads the connections-disabled flag and rejects any URI
/// whose scheme is not `https` before a connection is opened. The call
/// completes only once the whole body is buffered.
#[derive(Clone)]
pub struct SecureFetchClient {
    runtime_config: SharedRuntimeConfig,
    transport: Arc<dyn Transport>,
}

impl SecureFetchClient {
    pub fn new(runtime_config: SharedRuntimeConfig) -> Self {
        Self::with_transport(runtime_config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(runtime_config: SharedRuntimeConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            runtime_config,
            transport,
        }
    }

    /// Execute one request.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (no_connections, max_body_bytes) = {
            let cfg = self.runtime_config.read().unwrap_or_else(PoisonError::into_inner);
            (cfg.no_connections, cfg.max_response_bytes)
        };
        if no_connections {
            return Err(TransportError::ConnectionsDisabled);
        }

        let start = Instant::now();
        let url = Url::parse(&request.uri)
            .map_err(|e| TransportError::InvalidUri(format!("{}: {}", request.uri, e)))?;

        // Never send identity data over plaintext
        if url.scheme() != "https" {
            return Err(TransportError::NonSecureUrl(request.uri));
        }

        let mut connection = self.transport.open(prepare(request, url)).await?;

        let mut stream = match connection.input_stream() {
            Ok(stream) => stream,
            Err(err) => {
                debug!(error = %err, "Failed to get input stream, falling back to error stream");
                connection.error_stream().ok_or(TransportError::NoBodyStream)?
            }
        };

        let data = read_body(&mut stream, connection.content_length(), max_body_bytes).await?;
        let response = HttpResponse {
            status: connection.status(),
            body: String::from_utf8_lossy(&data).into_owned(),
            headers: connection.headers(),
        };

        debug!("Response body: {}", response.body.replace(['\n', '\r'], ""));
        debug!("Response code: {}", response.status);
        debug!("Request took {}ms", start.elapsed().as_millis());

        Ok(response)
    }
}

/// Resolve headers and encode the body.
fn prepare(request: HttpRequest, url: Url) -> OutboundRequest {
    let mut headers = vec![
        ("Accept".to_string(), request.accepts.content_type().to_string()),
        ("User-Agent".to_string(), request.user_agent),
        ("Cache-Control".to_string(), "no-cache".to_string()),
        ("Pragma".to_string(), "no-cache".to_string()),
    ];
    headers.extend(request.headers);

    let body = request.body.map(|body| {
        let bytes = body.body.into_bytes();
        headers.push(("Content-Type".to_string(), body.kind.content_type().to_string()));
        headers.push(("Content-Length".to_string(), bytes.len().to_string()));
        bytes
    });

    OutboundRequest {
        url,
        method: request.method,
        headers,
        body,
        timeout: Duration::from_millis(request.timeout_ms),
    }
}

/// Buffer exactly `content_length` bytes, or the whole stream when the peer
/// declared no length.
pub(crate) async fn read_body(
    stream: &mut BodyStream,
    content_length: Option<u64>,
    max_bytes: usize,
) -> Result<Vec<u8>, TransportError> {
    let Some(declared) = content_length else {
        let mut data = Vec::new();
        let read = stream.take(max_bytes as u64 + 1).read_to_end(&mut data).await?;
        if read > max_bytes {
            return Err(TransportError::BodyTooLarge { limit: max_bytes });
        }
        return Ok(data);
    };

    if declared > max_bytes as u64 {
        return Err(TransportError::BodyTooLarge { limit: max_bytes });
    }

    let mut data = vec![0u8; declared as usize];
    let mut offset = 0;
    while offset < data.len() {
        let read = stream.read(&mut data[offset..]).await?;
        if read == 0 {
            return Err(TransportError::ShortRead {
                got: offset as u64,
                declared,
            });
        }
        offset += read;
    }

    Ok(data)
}
