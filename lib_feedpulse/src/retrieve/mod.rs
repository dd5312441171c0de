//! # Data Retrieval Module
//!
//! HTTP plumbing for the session protocol.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: a generic `ApiClient` on `reqwest` and `reqwest-middleware`
//!   with exponential-backoff retries on transient failures.
//! - **`session_api`**: `HttpSessionApi`, the `SessionApi` port over
//!   `ApiClient`.

/// Generic HTTP API client with retry middleware.
pub mod ky_http;
/// The validation and logout calls over HTTP.
pub mod session_api;

pub use ky_http::{ApiClient, ApiResponse};
pub use session_api::HttpSessionApi;
