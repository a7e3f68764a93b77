//! Request builder.

use crate::{
    metadata::{merge_headers, parse_header},
    processor::BodyExpectation,
    Error, Processor, RequestMetadata, Response, Result,
};
use bytes::Bytes;
use http::HeaderMap;
use serde::{de::DeserializeOwned, de::IgnoredAny, Serialize};

/// A request being assembled for a [`Processor`].
///
/// Created by [`Processor::request`]. An invalid header or a body that fails
/// to serialize is reported when the request is sent, before anything reaches
/// the transport.
#[must_use = "a request does nothing until it is sent"]
pub struct RequestBuilder<'a> {
    processor: &'a Processor,
    metadata: RequestMetadata,
    body: Option<Bytes>,
    error: Option<Error>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(processor: &'a Processor, metadata: RequestMetadata) -> Self {
        Self {
            processor,
            metadata,
            body: None,
            error: None,
        }
    }

    /// Sets a header for this request, overriding a default header with the same name.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match parse_header(name.as_ref(), value.as_ref()) {
            Ok((name, value)) => {
                self.metadata.headers.insert(name, value);
            }
            Err(e) => self.fail(e),
        }
        self
    }

    /// Adds headers for this request. Names with several values keep all of them.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        merge_headers(&mut self.metadata.headers, &headers);
        self
    }

    /// Sets the request body as JSON.
    ///
    /// Ignored for GET requests.
    pub fn json<Req>(mut self, body: &Req) -> Self
    where
        Req: Serialize + ?Sized,
    {
        match encode_json(body) {
            Ok(bytes) => self.body = Some(bytes),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Sends the request and decodes the response body.
    pub async fn send<Res>(self) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.send_response().await.map(Response::into_data)
    }

    /// Sends the request and returns the decoded body with its response metadata.
    pub async fn send_response<Res>(self) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.dispatch(BodyExpectation::Strict).await
    }

    /// Sends the request and discards the response body, which may be empty.
    pub async fn send_discard(self) -> Result<()> {
        self.dispatch::<IgnoredAny>(BodyExpectation::AllowEmpty)
            .await
            .map(|_| ())
    }

    async fn dispatch<Res>(self, expectation: BodyExpectation) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.processor
            .instrumented(self.metadata, self.body, expectation)
            .await
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

pub(crate) fn encode_json<Req>(body: &Req) -> Result<Bytes>
where
    Req: Serialize + ?Sized,
{
    serde_json::to_vec(body)
        .map(Bytes::from)
        .map_err(|e| Error::Serialization(e.to_string()))
}
