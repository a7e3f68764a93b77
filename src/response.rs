//! Decoded response plus the details of the HTTP exchange that produced it.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// The result of [`Processor::call`](crate::Processor::call).
///
/// The verb methods (`get`, `post`, ...) return only [`Response::data`]; use
/// `call` when the status, headers or timing matter.
///
/// # Examples
///
/// ```no_run
/// use http::Method;
/// use http_processor::{Processor, RequestMetadata, Settings};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), http_processor::Error> {
/// let processor = Processor::new(Settings::builder("https://api.example.com").build()?)?;
///
/// let response = processor
///     .call::<(), User>(RequestMetadata::new(Method::GET, "/users/123"), None)
///     .await?;
///
/// println!("User: {}", response.data.name);
/// println!("Took {:?} over {} attempts", response.latency, response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    ///
    /// Not necessarily 2xx: a custom non-success handler may let other
    /// statuses through to decoding.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt being sent until the response was received,
    /// including any retry delays.
    pub latency: Duration,

    /// The number of attempts made. `1` means no retries.
    pub attempts: u32,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Discards the metadata and returns the decoded value.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
