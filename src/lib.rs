//! # http-processor - a resilient HTTP request pipeline
//!
//! `http-processor` sends requests to one configured service and gives every
//! call site the same behavior: a fresh deadline per attempt, a fixed number
//! of retries on transport failures, re-authentication when the server
//! answers 401, and typed JSON responses.
//!
//! ## Quick Start
//!
//! ```no_run
//! use http_processor::{Processor, Settings};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), http_processor::Error> {
//!     let settings = Settings::builder("https://api.example.com")
//!         .timeout_seconds(30)
//!         .retry_count(3)
//!         .retry_delay_seconds(1)
//!         .build()?;
//!
//!     let processor = Processor::builder(settings)
//!         .authenticator(|processor: Processor| async move {
//!             processor
//!                 .set_default_header("authorization", "Bearer token")
//!                 .is_ok()
//!         })
//!         .build()?;
//!
//!     processor.authenticate().await;
//!
//!     let user: User = processor.get("/users/123").await?;
//!     println!("User: {}", user.name);
//!
//!     let new_user = CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     };
//!     let created: User = processor.post("/users", &new_user).await?;
//!     println!("Created user with ID: {}", created.id);
//!
//!     processor
//!         .request(http_processor::http::Method::DELETE, format!("/users/{}", created.id))
//!         .header("x-audit-reason", "cleanup")
//!         .send_discard()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How a call runs
//!
//! 1. The endpoint is joined to the base URL with exactly one `/`.
//! 2. Each attempt is built from scratch and sent through the [`Transport`]
//!    with a deadline of `timeout_seconds`.
//! 3. A 2xx body is decoded into the requested type. Decode failures are
//!    never retried.
//! 4. A 401 runs the [`Authenticator`] `retry_count` times and then fails
//!    with [`Error::Unauthorized`].
//! 5. Any other non-2xx goes to the [`NonSuccessHandler`]. The default one
//!    fails with [`Error::NonSuccessStatus`]; a custom one may let the body
//!    through to decoding.
//! 6. Transport failures and timeouts are retried after `retry_delay_seconds`
//!    until `retry_count` attempts have been made, then the call fails with
//!    [`Error::RetriesExhausted`].
//!
//! ## Logging
//!
//! Events are emitted with `tracing` inside an `http_request` span carrying
//! the method and endpoint. Install any `tracing` subscriber to see them, or
//! pass a parent span with [`ProcessorBuilder::span`].

mod error;
pub mod hooks;
pub mod metadata;
mod processor;
mod request;
mod response;
pub mod retry;
mod settings;
pub mod transport;

pub use error::{Error, Result, TransportError};
pub use hooks::{
    AlwaysAuthenticated, Authenticator, FailOnNonSuccess, NonSuccessHandler, NonSuccessResponse,
};
pub use metadata::RequestMetadata;
pub use processor::{Processor, ProcessorBuilder};
pub use request::RequestBuilder;
pub use response::Response;
pub use retry::RetryPolicy;
pub use settings::{Settings, SettingsBuilder};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

// Re-export commonly used types
pub use http;
