//! Transport seam: one HTTP request in, one status and body out.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use elliptics_protocol::Method;
use tracing::trace;

use crate::error::Error;

/// A single request as the executor hands it to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

/// Status code and full body of an answered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Why the transport could not produce a response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within its timeout. Retryable.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The request was rejected before any answer (DNS, connect, protocol).
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Capability to issue one HTTP request with a timeout.
///
/// Implemented by [`ReqwestTransport`] in production and by in-memory fakes
/// in tests.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>>;
}

/// [`Transport`] over a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport keeping up to `max_sessions` idle connections per host.
    pub fn new(max_sessions: usize) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(max_sessions)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self { http })
    }

    /// Wraps an already configured client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let builder = match request.method {
                Method::Get => self.http.get(&request.url),
                Method::Head => self.http.head(&request.url),
                Method::Post => self.http.post(&request.url),
            };
            let builder = builder.timeout(request.timeout);
            let builder = match request.body {
                Some(body) => builder.body(body),
                None => builder,
            };

            let resp = builder.send().await.map_err(classify)?;
            let status = resp.status().as_u16();
            let body = resp.bytes().await.map_err(classify)?;
            trace!(status, len = body.len(), "response received");

            Ok(HttpResponse { status, body })
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Rejected(err.to_string())
    }
}
