//! # HTTP Session API
//!
//! `POST {base}/api/v2/session/validate` with `{"User": <record or null>}`
//! answers `{"Auth", "User", "Capabilities"}`. A 401 or 403 is read as
//! `Auth: false`; any other failure is a `SessionError::Api`.
//!
//! `POST {base}/api/v2/session/logout` is fire-and-forget; its body is ignored.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use crate::core::settings::StreamSettings;
use crate::error::{RetrieveError, SessionError};
use crate::models::{Credential, UserRecord, ValidationResponse};
use crate::ports::SessionApi;
use crate::retrieve::ky_http::ApiClient;

pub const VALIDATE_PATH: &str = "api/v2/session/validate";
pub const LOGOUT_PATH: &str = "api/v2/session/logout";

#[derive(Serialize)]
struct ValidateRequest<'a> {
    #[serde(rename = "User")]
    user: Option<&'a UserRecord>,
}

pub struct HttpSessionApi {
    client: ApiClient,
}

impl HttpSessionApi {
    /// The bearer token is read once here and sent with every request this
    /// instance makes. A changed credential needs a new `HttpSessionApi`.
    pub fn new(settings: &StreamSettings, credential: Option<&Credential>) -> Result<Self, RetrieveError> {
        let token = credential
            .filter(|c| !c.is_empty())
            .map(|c| c.as_str().to_string());
        let client = ApiClient::new(&settings.base_url, token, settings.request_timeout())?;
        Ok(Self { client })
    }

    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn validate(&self, candidate: Option<&UserRecord>) -> Result<ValidationResponse, SessionError> {
        let response = self
            .client
            .request::<ValidationResponse, _>(Method::POST, VALIDATE_PATH, Some(ValidateRequest { user: candidate }))
            .await
            .map_err(|err| SessionError::Api(format!("{err:#}")))?;

        match response.status {
            401 | 403 => {
                log::debug!("Validation answered {}, treating as rejection.", response.status);
                Ok(ValidationResponse::rejected())
            }
            _ if response.success => response
                .data
                .ok_or_else(|| SessionError::Api("empty validation response".into())),
            status => Err(SessionError::Api(format!(
                "validation answered {status}: {}",
                response.error_body.unwrap_or_default()
            ))),
        }
    }

    async fn logout(&self) -> Result<(), SessionError> {
        let response = self
            .client
            .request::<serde::de::IgnoredAny, ()>(Method::POST, LOGOUT_PATH, None)
            .await
            .map_err(|err| SessionError::Api(format!("{err:#}")))?;

        if response.success {
            Ok(())
        } else {
            Err(SessionError::Api(format!("logout answered {}", response.status)))
        }
    }
}
