//! Pluggable hooks for authentication and non-success responses.
//!
//! Both hooks are read from the processor at call time, so replacing one with
//! [`Processor::set_authenticator`](crate::Processor::set_authenticator) or
//! [`Processor::set_non_success_handler`](crate::Processor::set_non_success_handler)
//! affects every later attempt, including those of calls already in flight.

use crate::{Error, Processor, Result};
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::future::Future;

/// Establishes (or re-establishes) credentials for a [`Processor`].
///
/// Called by [`Processor::authenticate`] and, after a 401 response, by the
/// request loop. Storing a token is the authenticator's job, typically via
/// [`Processor::set_default_header`]; the processor never inspects it.
///
/// Any `Fn(Processor) -> impl Future<Output = bool>` closure is an
/// authenticator. The closure receives a cheap clone of the processor.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use http_processor::{Authenticator, Processor};
///
/// struct StaticToken(String);
///
/// #[async_trait]
/// impl Authenticator for StaticToken {
///     async fn authenticate(&self, processor: &Processor) -> bool {
///         processor
///             .set_default_header("authorization", &format!("Bearer {}", self.0))
///             .is_ok()
///     }
/// }
/// ```
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns `true` if authentication succeeded.
    async fn authenticate(&self, processor: &Processor) -> bool;
}

/// The default authenticator: reports success without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAuthenticated;

#[async_trait]
impl Authenticator for AlwaysAuthenticated {
    async fn authenticate(&self, _processor: &Processor) -> bool {
        true
    }
}

#[async_trait]
impl<F, Fut> Authenticator for F
where
    F: Fn(Processor) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn authenticate(&self, processor: &Processor) -> bool {
        (self)(processor.clone()).await
    }
}

/// A non-2xx, non-401 response handed to a [`NonSuccessHandler`].
#[derive(Debug, Clone, Copy)]
pub struct NonSuccessResponse<'a> {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response body as text.
    pub body: &'a str,
    /// The request method.
    pub method: &'a Method,
    /// The endpoint as passed by the caller, not the resolved URL.
    pub endpoint: &'a str,
}

impl NonSuccessResponse<'_> {
    /// Builds the error the default handler returns for this response.
    pub fn to_error(&self) -> Error {
        Error::NonSuccessStatus {
            method: self.method.clone(),
            endpoint: self.endpoint.to_string(),
            status: self.status,
            body: self.body.to_string(),
        }
    }
}

/// Decides what happens to a non-2xx response other than 401.
///
/// Returning `Ok(())` lets the processor decode the body as if it were a
/// success payload. Returning an error stops the attempt: transport-class
/// errors (see [`Error::is_retryable`]) are retried, anything else ends the
/// call.
///
/// Any `Fn(&NonSuccessResponse<'_>) -> Result<()>` closure is a handler.
///
/// # Examples
///
/// ```
/// use http_processor::{NonSuccessHandler, NonSuccessResponse, Result};
///
/// /// Treats 404 bodies as valid payloads and rejects everything else.
/// struct AcceptNotFound;
///
/// impl NonSuccessHandler for AcceptNotFound {
///     fn handle(&self, response: &NonSuccessResponse<'_>) -> Result<()> {
///         if response.status.as_u16() == 404 {
///             Ok(())
///         } else {
///             Err(response.to_error())
///         }
///     }
/// }
/// ```
pub trait NonSuccessHandler: Send + Sync {
    /// Inspects a non-success response.
    fn handle(&self, response: &NonSuccessResponse<'_>) -> Result<()>;
}

/// The default handler: every non-success response is a terminal
/// [`Error::NonSuccessStatus`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FailOnNonSuccess;

impl NonSuccessHandler for FailOnNonSuccess {
    fn handle(&self, response: &NonSuccessResponse<'_>) -> Result<()> {
        tracing::error!(
            status = response.status.as_u16(),
            method = %response.method,
            endpoint = response.endpoint,
            response = response.body,
            "Non successful status code received"
        );
        Err(response.to_error())
    }
}

impl<F> NonSuccessHandler for F
where
    F: Fn(&NonSuccessResponse<'_>) -> Result<()> + Send + Sync,
{
    fn handle(&self, response: &NonSuccessResponse<'_>) -> Result<()> {
        (self)(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response<'a>(method: &'a Method, body: &'a str) -> NonSuccessResponse<'a> {
        NonSuccessResponse {
            status: StatusCode::BAD_GATEWAY,
            body,
            method,
            endpoint: "/upstream",
        }
    }

    #[test]
    fn test_default_handler_reports_everything_verbatim() {
        let method = Method::DELETE;
        let err = FailOnNonSuccess
            .handle(&response(&method, "upstream \"down\""))
            .unwrap_err();

        match err {
            Error::NonSuccessStatus {
                method,
                endpoint,
                status,
                body,
            } => {
                assert_eq!(method, Method::DELETE);
                assert_eq!(endpoint, "/upstream");
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, "upstream \"down\"");
            }
            other => panic!("Expected NonSuccessStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_closure_handler() {
        let handler = |response: &NonSuccessResponse<'_>| {
            if response.body.is_empty() {
                Err(Error::General("empty".into()))
            } else {
                Ok(())
            }
        };

        let method = Method::GET;
        assert!(handler.handle(&response(&method, "{}")).is_ok());
        assert!(matches!(
            handler.handle(&response(&method, "")),
            Err(Error::General(_))
        ));
    }
}
