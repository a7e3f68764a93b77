//! The HTTP transport seam.
//!
//! A [`Processor`](crate::Processor) never talks to the network directly. It
//! hands each attempt to a [`Transport`] it owns, which makes the engine
//! testable with a scripted fake. [`ReqwestTransport`] is the default.

use crate::{Error, Result, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;

/// One fully-built attempt, created fresh for every send.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute target URL.
    pub url: String,
    /// Default headers merged with the per-request headers.
    pub headers: HeaderMap,
    /// The encoded body, if any.
    pub body: Option<Bytes>,
    /// The deadline for this attempt.
    ///
    /// The processor enforces it as well; transports may pass it to their
    /// own client.
    pub timeout: Duration,
}

/// What the server answered to one attempt.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The full response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends a single HTTP request.
///
/// Implementations must be safe to call from many in-flight requests at once.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use http::StatusCode;
/// use http_processor::{Transport, TransportError, TransportRequest, TransportResponse};
///
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl Transport for AlwaysOk {
///     async fn send(
///         &self,
///         _request: TransportRequest,
///     ) -> Result<TransportResponse, TransportError> {
///         Ok(TransportResponse::new(StatusCode::OK, "{}"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the complete response.
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// A [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            Error::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Maps a `reqwest` failure onto the transport taxonomy.
///
/// reqwest does not report the deadline it hit, so the attempt's own timeout is used.
fn transport_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_is_lossy() {
        let response = TransportResponse::new(StatusCode::OK, vec![b'o', b'k', 0xff]);
        assert_eq!(response.text(), "ok\u{fffd}");
        assert!(response.headers.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let transport = ReqwestTransport::new().unwrap();
        let result = transport
            .send(TransportRequest {
                method: Method::GET,
                url: "http://127.0.0.1:1/".to_string(),
                headers: HeaderMap::new(),
                body: None,
                timeout: Duration::from_secs(5),
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_client_timeout_reports_the_attempt_deadline() {
        // Accepted by the kernel backlog but never answered.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = ReqwestTransport::new().unwrap();
        let result = transport
            .send(TransportRequest {
                method: Method::GET,
                url: format!("http://{}/", addr),
                headers: HeaderMap::new(),
                body: None,
                timeout: Duration::from_millis(200),
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            TransportError::Timeout(Duration::from_millis(200))
        );
        drop(listener);
    }
}
