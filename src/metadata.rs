//! Per-call request description.

use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Method, endpoint, and extra headers for one call.
///
/// The endpoint is relative to the processor's base URL and is used as given;
/// put query strings in it directly.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The endpoint, relative to the base URL.
    pub endpoint: String,

    /// Headers added to every attempt of this call, overriding default headers.
    pub headers: HeaderMap,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and endpoint.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Sets a header on the request, replacing any value with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds every header from `headers`.
    ///
    /// Each name present in `headers` replaces the existing values for that
    /// name. Names with several values keep all of them.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        merge_headers(&mut self.headers, &headers);
        self
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}

/// Overlays `extra` on `target` name by name, keeping repeated values.
pub(crate) fn merge_headers(target: &mut HeaderMap, extra: &HeaderMap) {
    for name in extra.keys() {
        target.remove(name);
    }
    for (name, value) in extra {
        target.append(name.clone(), value.clone());
    }
}
