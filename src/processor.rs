//! The request engine.
//!
//! [`Processor`] resolves endpoints against the configured base URL, sends
//! each attempt through its [`Transport`] under a fresh deadline, retries
//! transport failures, re-authenticates on 401 and decodes typed responses.
//! Build one with [`Processor::new`] or [`Processor::builder`].

use crate::{
    hooks::{AlwaysAuthenticated, Authenticator, FailOnNonSuccess, NonSuccessHandler, NonSuccessResponse},
    metadata::{merge_headers, parse_header, RequestMetadata},
    request::{encode_json, RequestBuilder},
    retry::AttemptOutcome,
    transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse},
    Error, Response, Result, Settings, TransportError,
};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, de::IgnoredAny, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// An HTTP request pipeline with retries, timeouts and re-authentication.
///
/// Cloning is cheap and clones share the transport, hooks, default headers
/// and authentication state. Concurrent calls run independently.
///
/// # Examples
///
/// ```no_run
/// use http_processor::{Processor, Settings};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), http_processor::Error> {
/// let settings = Settings::builder("https://api.example.com")
///     .timeout_seconds(10)
///     .retry_count(3)
///     .retry_delay_seconds(1)
///     .build()?;
///
/// let processor = Processor::builder(settings)
///     .authenticator(|processor: Processor| async move {
///         processor
///             .set_default_header("authorization", "Bearer secret")
///             .is_ok()
///     })
///     .build()?;
///
/// let user: User = processor.get("/users/123").await?;
/// println!("User: {}", user.name);
///
/// let created: User = processor
///     .post("/users", &CreateUser { name: "Alice".to_string() })
///     .await?;
/// println!("Created user with ID: {}", created.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Processor {
    inner: Arc<ProcessorInner>,
}

struct ProcessorInner {
    transport: Arc<dyn Transport>,
    settings: Settings,
    default_headers: RwLock<HeaderMap>,
    authenticator: RwLock<Arc<dyn Authenticator>>,
    non_success_handler: RwLock<Arc<dyn NonSuccessHandler>>,
    authenticated: AtomicBool,
    span: Option<tracing::Span>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("settings", &self.inner.settings)
            .field("is_authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// Creates a processor with a default [`ReqwestTransport`] and default hooks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the settings are invalid or the
    /// HTTP client cannot be built.
    pub fn new(settings: Settings) -> Result<Self> {
        ProcessorBuilder::new(settings).build()
    }

    /// Creates a new `ProcessorBuilder` for the given settings.
    pub fn builder(settings: Settings) -> ProcessorBuilder {
        ProcessorBuilder::new(settings)
    }

    /// The settings this processor was built with.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// The transport every attempt is sent through.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.inner.transport)
    }

    /// The result of the most recent authentication attempt.
    ///
    /// Informational only: requests are sent the same way whatever its value.
    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::SeqCst)
    }

    /// Replaces the authenticator. Takes effect for the next authentication.
    pub fn set_authenticator(&self, authenticator: impl Authenticator + 'static) {
        *self.inner.authenticator.write() = Arc::new(authenticator);
    }

    /// Replaces the non-success handler. Takes effect for the next non-success response.
    pub fn set_non_success_handler(&self, handler: impl NonSuccessHandler + 'static) {
        *self.inner.non_success_handler.write() = Arc::new(handler);
    }

    /// Sets a header sent with every later attempt of every call.
    ///
    /// Per-request headers with the same name take precedence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the header name or value is invalid.
    pub fn set_default_header(&self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.inner.default_headers.write().insert(name, value);
        Ok(())
    }

    /// Removes a default header, returning its previous value.
    pub fn remove_default_header(&self, name: impl AsRef<str>) -> Option<HeaderValue> {
        self.inner.default_headers.write().remove(name.as_ref())
    }

    /// A snapshot of the current default headers.
    pub fn default_headers(&self) -> HeaderMap {
        self.inner.default_headers.read().clone()
    }

    /// Runs the authenticator once and records its result.
    ///
    /// Call this before the first request to a protected resource to avoid a
    /// round-trip that ends in 401. There is no retry here; retries around
    /// authentication only happen inside the request loop.
    pub async fn authenticate(&self) -> bool {
        let authenticator = Arc::clone(&*self.inner.authenticator.read());
        let authenticated = authenticator.authenticate(self).await;
        self.inner
            .authenticated
            .store(authenticated, Ordering::SeqCst);
        tracing::debug!(authenticated, "Authentication finished");
        authenticated
    }

    /// Makes a request and returns the decoded body with its response metadata.
    ///
    /// A GET request never carries a body: one passed here is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::RetriesExhausted`] if every attempt failed at the transport level
    /// - [`Error::Unauthorized`] if a 401 persisted through re-authentication
    /// - [`Error::NonSuccessStatus`] (or a custom hook error) for other non-2xx responses
    /// - [`Error::Deserialization`] if the body does not decode into `Res`
    /// - [`Error::Serialization`] if `body` cannot be encoded
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use http::Method;
    /// use http_processor::{Processor, RequestMetadata, Settings};
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Serialize)]
    /// struct Search { query: String }
    ///
    /// #[derive(Deserialize)]
    /// struct Results { items: Vec<String> }
    ///
    /// # async fn example() -> Result<(), http_processor::Error> {
    /// let processor = Processor::new(Settings::builder("https://api.example.com").build()?)?;
    ///
    /// let metadata = RequestMetadata::new(Method::POST, "/search")
    ///     .with_header("x-request-id", "42")?;
    /// let search = Search { query: "rust".to_string() };
    ///
    /// let response = processor.call::<_, Results>(metadata, Some(&search)).await?;
    /// println!("{} results after {} attempts", response.items.len(), response.attempts);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<Req, Res>(
        &self,
        metadata: RequestMetadata,
        body: Option<&Req>,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let body = body.map(encode_json).transpose()?;
        self.instrumented(metadata, body, BodyExpectation::Strict).await
    }

    /// Like [`call`](Self::call), but discards the decoded body.
    ///
    /// Any JSON body is accepted, and so is an empty one (e.g. `204 No Content`).
    pub async fn call_discard<Req>(&self, metadata: RequestMetadata, body: Option<&Req>) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        let body = body.map(encode_json).transpose()?;
        self.instrumented::<IgnoredAny>(metadata, body, BodyExpectation::AllowEmpty)
            .await
            .map(|_| ())
    }

    pub(crate) async fn instrumented<Res>(
        &self,
        metadata: RequestMetadata,
        body: Option<Bytes>,
        expectation: BodyExpectation,
    ) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let span = match &self.inner.span {
            Some(parent) => tracing::debug_span!(
                parent: parent,
                "http_request",
                method = %metadata.method,
                endpoint = %metadata.endpoint
            ),
            None => tracing::debug_span!(
                "http_request",
                method = %metadata.method,
                endpoint = %metadata.endpoint
            ),
        };

        self.send_request(metadata, body, expectation)
            .instrument(span)
            .await
    }

    /// Runs the outer retry loop for one call.
    async fn send_request<Res>(
        &self,
        metadata: RequestMetadata,
        body: Option<Bytes>,
        expectation: BodyExpectation,
    ) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let url = self.inner.settings.absolute_url(&metadata.endpoint);
        let body = match body {
            Some(_) if metadata.method == Method::GET => {
                tracing::debug!("Ignoring body supplied for GET request");
                None
            }
            body => body,
        };
        let policy = self.inner.settings.retry_policy();
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.attempt(&metadata, &url, body.clone(), attempt).await {
                AttemptOutcome::Completed(response) => {
                    return decode(response, start_time, attempt, expectation);
                }
                AttemptOutcome::Terminal(e) => return Err(e),
                AttemptOutcome::Retry(e) => e,
            };

            tracing::warn!(
                error = %error,
                attempt = attempt,
                method = %metadata.method,
                endpoint = %metadata.endpoint,
                "Request attempt failed"
            );

            match policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        attempt = attempt,
                        "Retrying request after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(Error::RetriesExhausted {
                        method: metadata.method,
                        endpoint: metadata.endpoint,
                        retry_count: policy.retry_count(),
                        last_error: Box::new(error),
                    });
                }
            }
        }
    }

    /// Sends one attempt and interprets its status.
    async fn attempt(
        &self,
        metadata: &RequestMetadata,
        url: &str,
        body: Option<Bytes>,
        attempt: u32,
    ) -> AttemptOutcome<TransportResponse> {
        let timeout = self.inner.settings.timeout();
        let request = TransportRequest {
            method: metadata.method.clone(),
            url: url.to_string(),
            headers: self.request_headers(&metadata.headers, body.is_some()),
            body,
            timeout,
        };

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let response = match tokio::time::timeout(timeout, self.inner.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return AttemptOutcome::Retry(e.into()),
            Err(_) => return AttemptOutcome::Retry(TransportError::Timeout(timeout).into()),
        };

        tracing::info!(
            status = response.status.as_u16(),
            attempt = attempt,
            "Received HTTP response"
        );

        if response.status.is_success() {
            return AttemptOutcome::Completed(response);
        }

        if response.status == StatusCode::UNAUTHORIZED {
            return AttemptOutcome::Terminal(self.reauthenticate(metadata).await);
        }

        let body = response.text();
        let handler = Arc::clone(&*self.inner.non_success_handler.read());
        let verdict = handler.handle(&NonSuccessResponse {
            status: response.status,
            body: &body,
            method: &metadata.method,
            endpoint: &metadata.endpoint,
        });

        match verdict {
            Ok(()) => AttemptOutcome::Completed(response),
            Err(e) => AttemptOutcome::from_error(e),
        }
    }

    /// Calls the authenticator `retry_count` times after a 401.
    ///
    /// The loop does not stop on success, so it always spends its whole
    /// budget and the original request is reported as unauthorized.
    async fn reauthenticate(&self, metadata: &RequestMetadata) -> Error {
        let retry_count = self.inner.settings.retry_count;

        for attempt in 1..=retry_count {
            let authenticated = self.authenticate().await;
            tracing::debug!(attempt, authenticated, "Re-authentication attempt");
        }

        tracing::error!(
            method = %metadata.method,
            endpoint = %metadata.endpoint,
            retry_count,
            "Failed to authenticate"
        );

        Error::Unauthorized {
            method: metadata.method.clone(),
            endpoint: metadata.endpoint.clone(),
            retry_count,
        }
    }

    fn request_headers(&self, extra: &HeaderMap, has_body: bool) -> HeaderMap {
        let mut headers = self.inner.default_headers.read().clone();

        if has_body {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            );
        }

        merge_headers(&mut headers, extra);
        headers
    }

    /// Starts a request with per-request headers or a body on any method.
    ///
    /// The verb methods below are shortcuts over this builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use http::Method;
    /// use http_processor::{Processor, Settings};
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Reason { text: String }
    ///
    /// # async fn example() -> Result<(), http_processor::Error> {
    /// let processor = Processor::new(Settings::builder("https://api.example.com").build()?)?;
    ///
    /// processor
    ///     .request(Method::DELETE, "/users/123")
    ///     .header("x-request-id", "42")
    ///     .json(&Reason { text: "duplicate".to_string() })
    ///     .send_discard()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn request(&self, method: Method, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, RequestMetadata::new(method, endpoint))
    }

    /// Makes a GET request and decodes the response.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use http_processor::{Processor, Settings};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), http_processor::Error> {
    /// let processor = Processor::new(Settings::builder("https://api.example.com").build()?)?;
    ///
    /// let user: User = processor.get("/users/123").await?;
    /// println!("User: {}", user.name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(&self, endpoint: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.request(Method::GET, endpoint).send().await
    }

    /// Makes a POST request with a JSON body and decodes the response.
    pub async fn post<Req, Res>(&self, endpoint: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.request(Method::POST, endpoint).json(body).send().await
    }

    /// Makes a PUT request with a JSON body and decodes the response.
    pub async fn put<Req, Res>(&self, endpoint: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.request(Method::PUT, endpoint).json(body).send().await
    }

    /// Makes a PATCH request with a JSON body and decodes the response.
    pub async fn patch<Req, Res>(&self, endpoint: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.request(Method::PATCH, endpoint).json(body).send().await
    }

    /// Makes a DELETE request and decodes the response.
    ///
    /// Use [`request`](Self::request) to send a DELETE with a body.
    pub async fn delete<Res>(&self, endpoint: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.request(Method::DELETE, endpoint).send().await
    }

    /// Makes a GET request and discards the response body.
    pub async fn get_discard(&self, endpoint: impl Into<String>) -> Result<()> {
        self.request(Method::GET, endpoint).send_discard().await
    }

    /// Makes a POST request with a JSON body and discards the response body.
    pub async fn post_discard<Req>(&self, endpoint: impl Into<String>, body: &Req) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        self.request(Method::POST, endpoint).json(body).send_discard().await
    }

    /// Makes a PUT request with a JSON body and discards the response body.
    pub async fn put_discard<Req>(&self, endpoint: impl Into<String>, body: &Req) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        self.request(Method::PUT, endpoint).json(body).send_discard().await
    }

    /// Makes a PATCH request with a JSON body and discards the response body.
    pub async fn patch_discard<Req>(&self, endpoint: impl Into<String>, body: &Req) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        self.request(Method::PATCH, endpoint).json(body).send_discard().await
    }

    /// Makes a DELETE request and discards the response body.
    pub async fn delete_discard(&self, endpoint: impl Into<String>) -> Result<()> {
        self.request(Method::DELETE, endpoint).send_discard().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyExpectation {
    Strict,
    /// An empty body decodes as JSON `null`.
    AllowEmpty,
}

/// Decodes a completed response. Runs outside the retry loop.
fn decode<Res>(
    response: TransportResponse,
    start_time: Instant,
    attempts: u32,
    expectation: BodyExpectation,
) -> Result<Response<Res>>
where
    Res: DeserializeOwned,
{
    let raw_body = response.text();
    let json: &[u8] = if expectation == BodyExpectation::AllowEmpty && raw_body.trim().is_empty() {
        b"null"
    } else {
        &response.body
    };

    match serde_json::from_slice::<Res>(json) {
        Ok(data) => Ok(Response::new(
            data,
            raw_body,
            response.status,
            response.headers,
            start_time.elapsed(),
            attempts,
        )),
        Err(e) => {
            tracing::error!(
                error = %e,
                status = response.status.as_u16(),
                raw_response = %raw_body,
                "Failed to deserialize response"
            );

            Err(Error::Deserialization {
                raw_response: raw_body,
                serde_error: e.to_string(),
                status: response.status,
            })
        }
    }
}

/// Builder for configuring and creating a [`Processor`].
///
/// # Examples
///
/// ```no_run
/// use http_processor::{NonSuccessResponse, Processor, Settings};
///
/// # fn example() -> Result<(), http_processor::Error> {
/// let processor = Processor::builder(Settings::builder("https://api.example.com").build()?)
///     .default_header("User-Agent", "my-app/1.0")?
///     .non_success_handler(|response: &NonSuccessResponse<'_>| -> http_processor::Result<()> {
///         tracing::warn!(status = %response.status, "Accepting non-success body");
///         Ok(())
///     })
///     .span(tracing::info_span!("billing_api"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ProcessorBuilder {
    settings: Settings,
    transport: Option<Arc<dyn Transport>>,
    default_headers: HeaderMap,
    authenticator: Arc<dyn Authenticator>,
    non_success_handler: Arc<dyn NonSuccessHandler>,
    span: Option<tracing::Span>,
}

impl ProcessorBuilder {
    /// Creates a new `ProcessorBuilder` with default hooks and transport.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            transport: None,
            default_headers: HeaderMap::new(),
            authenticator: Arc::new(AlwaysAuthenticated),
            non_success_handler: Arc::new(FailOnNonSuccess),
            span: None,
        }
    }

    /// Sets the transport. Defaults to a [`ReqwestTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a transport that is shared with other owners.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the authenticator. Defaults to [`AlwaysAuthenticated`].
    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    /// Sets the non-success handler. Defaults to [`FailOnNonSuccess`].
    pub fn non_success_handler(mut self, handler: impl NonSuccessHandler + 'static) -> Self {
        self.non_success_handler = Arc::new(handler);
        self
    }

    /// Sets the span request events are recorded under.
    ///
    /// Without one, each request span is a child of whatever span is current
    /// when the call starts.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Builds the configured `Processor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the default transport
    /// cannot be built.
    pub fn build(self) -> Result<Processor> {
        self.settings.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Processor {
            inner: Arc::new(ProcessorInner {
                transport,
                settings: self.settings,
                default_headers: RwLock::new(self.default_headers),
                authenticator: RwLock::new(self.authenticator),
                non_success_handler: RwLock::new(self.non_success_handler),
                authenticated: AtomicBool::new(false),
                span: self.span,
            }),
        })
    }
}
