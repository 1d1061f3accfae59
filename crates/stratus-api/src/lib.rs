//! Signed request and transport layer for the Stratus platform API.
//!
//! This crate turns a logical API call into an authenticated HTTP request
//! and an HTTP response into a typed result or a classified failure. It is
//! consumed by higher-level subsystems (deployment orchestration, layer
//! management) and knows nothing about what the individual actions mean.
//!
//! # Architecture
//!
//! A call moves through three stages:
//!
//! ```text
//! ActionRequest ──▶ sign ──▶ send ──▶ { ApiResponse | ApiError }
//! ```
//!
//! - [`request::ActionRequest`] carries the action name, API version and an
//!   ordered parameter map. Absent optional parameters are omitted, never
//!   set to null.
//! - [`sign`] derives a deterministic canonical string from the request and
//!   computes an HMAC-SHA256 signature over it with a date-scoped key chain.
//!   Each call signs with fresh wall-clock time; signatures are never reused.
//! - [`transport::ApiClient`] performs the network call, parses the
//!   platform's `{ "Response": { ... } }` envelope and classifies failures
//!   into the [`error::ApiError`] taxonomy.
//!
//! Transport is deliberately not idempotent: it has no knowledge of which
//! remote operations are safe to repeat, so retry policy lives with the
//! callers that do.
//!
//! # Example
//!
//! ```ignore
//! use stratus_api::{ActionRequest, ApiClient, CloudApi, Credentials};
//!
//! let credentials = Credentials::new("AKID...", "secret...");
//! let client = ApiClient::new(credentials, "stratusapi.com", Duration::from_secs(30))?;
//!
//! let request = ActionRequest::new("faas", "2023-04-01", "ListFunctions")
//!     .with_region("ap-east-1")
//!     .param("Namespace", "default");
//!
//! let response = client.call(request).await?;
//! ```

pub mod credentials;
pub mod envelope;
pub mod error;
pub mod request;
pub mod sign;
pub mod transport;

pub use credentials::Credentials;
pub use envelope::ApiResponse;
pub use error::{ApiError, ApiResult};
pub use request::{ActionRequest, HttpMethod};
pub use sign::SignedRequest;
pub use transport::{ApiClient, CloudApi};
