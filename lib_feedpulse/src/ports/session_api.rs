use async_trait::async_trait;

use crate::error::SessionError;
use crate::models::{UserRecord, ValidationResponse};

/// # Session API
///
/// Server side of the session protocol. A refused candidate is a normal
/// response with `auth == false`; `Err` is reserved for calls that never got a
/// protocol-level answer.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Submits `candidate` (or nothing) for validation.
    async fn validate(&self, candidate: Option<&UserRecord>) -> Result<ValidationResponse, SessionError>;

    /// Fire-and-forget logout notification.
    async fn logout(&self) -> Result<(), SessionError>;
}
