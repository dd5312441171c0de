use std::sync::Arc;

use crate::core::connection::ConnectionHandle;
use crate::models::Credential;

/// # Connector
///
/// Opens a physical push connection addressed with a credential. The returned
/// handle is open; the implementation keeps feeding it frames until the handle
/// is closed or the transport drops, whichever comes first.
///
/// Called from within a tokio runtime. Never called with an empty credential.
pub trait Connector: Send + Sync {
    fn open(&self, credential: &Credential) -> Arc<ConnectionHandle>;
}
