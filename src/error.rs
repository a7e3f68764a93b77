//! Error types for the request pipeline.
//!
//! Only [`TransportError`] is ever recovered locally (by retrying). Every other
//! variant of [`Error`] is terminal for the call that produced it and carries
//! enough context (method, endpoint, status, body, retry counts) to diagnose
//! the failure without re-running the request.

use http::{Method, StatusCode};
use std::time::Duration;

/// A failure raised by a [`Transport`](crate::Transport) while sending a single attempt.
///
/// These are transient by definition: the processor retries them within the
/// outer attempt budget and only surfaces the last one inside
/// [`Error::RetriesExhausted`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt did not complete before its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established (refused, DNS failure, TLS handshake).
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The attempt was cancelled before a response arrived.
    #[error("Request cancelled")]
    Cancelled,

    /// The request could not be sent or its response body could not be read.
    #[error("Transport error: {0}")]
    Request(String),
}

/// The main error type returned by [`Processor`](crate::Processor) calls.
///
/// # Examples
///
/// ```no_run
/// use http_processor::{Error, Processor, Settings};
///
/// # async fn example() -> Result<(), Error> {
/// let processor = Processor::new(Settings::builder("https://api.example.com").build()?)?;
///
/// match processor.get::<serde_json::Value>("/endpoint").await {
///     Ok(value) => println!("Success: {value}"),
///     Err(Error::NonSuccessStatus { status, body, .. }) => {
///         eprintln!("Server answered {status}: {body}");
///     }
///     Err(Error::Unauthorized { retry_count, .. }) => {
///         eprintln!("Still unauthorized after {retry_count} re-authentication attempts");
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A single attempt failed at the transport level.
    ///
    /// The processor retries these; callers normally only see one nested in
    /// [`Error::RetriesExhausted`]. A [`NonSuccessHandler`](crate::NonSuccessHandler)
    /// may also return one to request a retry.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server kept answering 401 and re-authentication did not help.
    ///
    /// Raised after the authenticator has been invoked `retry_count` times.
    #[error("Failed to authenticate {method} {endpoint} after {retry_count} retries")]
    Unauthorized {
        /// The request method
        method: Method,
        /// The endpoint as passed by the caller
        endpoint: String,
        /// The configured retry count, which bounds re-authentication attempts
        retry_count: u32,
    },

    /// A non-2xx, non-401 response was rejected by the default non-success handler.
    #[error("Non successful status code received. Request {method} {endpoint} Status code: {status}, body: \"{body}\"")]
    NonSuccessStatus {
        /// The request method
        method: Method,
        /// The endpoint as passed by the caller
        endpoint: String,
        /// The HTTP status code
        status: StatusCode,
        /// The response body, verbatim
        body: String,
    },

    /// Every attempt of the outer retry loop failed with a retryable error.
    #[error("Failed to get data from the server after {retry_count} retries ({method} {endpoint}): {last_error}")]
    RetriesExhausted {
        /// The request method
        method: Method,
        /// The endpoint as passed by the caller
        endpoint: String,
        /// The configured retry count
        retry_count: u32,
        /// The error of the final attempt
        last_error: Box<Error>,
    },

    /// A terminal failure raised by a custom hook.
    #[error("{0}")]
    General(String),

    /// Failed to deserialize the response body into the expected type.
    ///
    /// Decoding happens outside the retry loop, so a malformed body is never retried.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    Deserialization {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    Serialization(String),

    /// Invalid settings or builder input.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Returns `true` if the outer retry loop should try again after this error.
    ///
    /// Only transport-level failures are retryable; everything else is terminal.
    ///
    /// # Examples
    ///
    /// ```
    /// use http_processor::{Error, TransportError};
    /// use std::time::Duration;
    ///
    /// let err = Error::Transport(TransportError::Timeout(Duration::from_secs(1)));
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::General("rejected".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::NonSuccessStatus { status, .. } => Some(*status),
            Error::Deserialization { status, .. } => Some(*status),
            Error::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::NonSuccessStatus { body, .. } => Some(body),
            Error::Deserialization { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for processor calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(Error::Transport(TransportError::Cancelled).is_retryable());
        assert!(Error::Transport(TransportError::Connect("refused".into())).is_retryable());

        let terminal = [
            Error::General("nope".into()),
            Error::Serialization("bad".into()),
            Error::Configuration("bad".into()),
            Error::Unauthorized {
                method: Method::GET,
                endpoint: "/a".into(),
                retry_count: 3,
            },
            Error::NonSuccessStatus {
                method: Method::GET,
                endpoint: "/a".into(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".into(),
            },
        ];
        for err in terminal {
            assert!(!err.is_retryable(), "{err:?} should be terminal");
        }
    }

    #[test]
    fn test_non_success_message_carries_request_details() {
        let err = Error::NonSuccessStatus {
            method: Method::PUT,
            endpoint: "/orders/7".into(),
            status: StatusCode::CONFLICT,
            body: "{\"reason\":\"stale\"}".into(),
        };

        let message = err.to_string();
        assert!(message.contains("PUT /orders/7"));
        assert!(message.contains("409"));
        assert!(message.contains("{\"reason\":\"stale\"}"));
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.raw_response(), Some("{\"reason\":\"stale\"}"));
    }

    #[test]
    fn test_retries_exhausted_reports_count_and_cause() {
        let err = Error::RetriesExhausted {
            method: Method::GET,
            endpoint: "/slow".into(),
            retry_count: 4,
            last_error: Box::new(TransportError::Timeout(Duration::from_secs(2)).into()),
        };

        let message = err.to_string();
        assert!(message.contains("after 4 retries"));
        assert!(message.contains("timed out"));
        assert_eq!(err.status(), None);
    }
}
