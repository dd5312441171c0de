//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest`, with retry middleware
//! and uniform JSON response handling.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::RetrieveError;

/// Retries on transient errors (connect failures, 5xx, 408, 429).
const MAX_RETRIES: u32 = 3;

/// A response together with its status.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized body. `None` on failure or for an empty 2xx body.
    pub data: Option<T>,
    /// The raw body of a non-2xx response.
    pub error_body: Option<String>,
    pub status: u16,
    /// Whether the status was in the 2xx range.
    pub success: bool,
}

/// # API Client
///
/// Joins relative paths onto a base URL, injects the bearer token and
/// retries transient failures with exponential backoff.
pub struct ApiClient {
    inner: ClientWithMiddleware,
    base_url: Url,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a client. `base_url` must be absolute; end it with `/` so that
    /// relative paths are joined below it.
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self, RetrieveError> {
        let base_url = Url::parse(base_url)?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feedpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let inner = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner,
            base_url,
            auth_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// # Request
    ///
    /// Sends one request and captures the response.
    ///
    /// A non-2xx status is not an error: it comes back with `success == false`
    /// and the raw body in `error_body`.
    ///
    /// # Errors
    /// URL joining, body serialization, the network, or a 2xx body that is not
    /// valid JSON for `T`.
    pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<B>) -> anyhow::Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        // 1. Construct the full absolute URL
        let full_url = self.base_url.join(path)?;
        let mut req = self.inner.request(method, full_url);

        // 2. Bearer authentication
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        // 3. JSON body
        if let Some(b) = body {
            let json_body = serde_json::to_string(&b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        // 4. Execute
        let response: reqwest::Response = req.send().await?;
        let status = response.status();

        // 5. Decode by status
        if status.is_success() {
            let bytes = response.bytes().await?;
            let data = if bytes.iter().all(u8::is_ascii_whitespace) {
                None
            } else {
                Some(serde_json::from_slice::<T>(&bytes)?)
            };
            Ok(ApiResponse {
                data,
                error_body: None,
                status: status.as_u16(),
                success: true,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_base_url() {
        let err = ApiClient::new("not a url", None, Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, RetrieveError::InvalidBaseUrl(_)));
    }

    #[test]
    fn paths_join_below_base() {
        let client = ApiClient::new("http://127.0.0.1:9/reader/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.base_url().join("api/v2/session/validate").unwrap().as_str(),
            "http://127.0.0.1:9/reader/api/v2/session/validate"
        );
    }
}
