use std::sync::Arc;

use super::user::UserRecord;

/// # Session State
///
/// Owned by the session validator and exposed read-only. `Trusted` only ever
/// holds a record the server has confirmed.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    /// A validation round trip is in flight.
    Validating,
    Trusted(Arc<UserRecord>),
}

impl SessionState {
    pub fn is_validating(&self) -> bool {
        matches!(self, Self::Validating)
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted(_))
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    pub fn user(&self) -> Option<&Arc<UserRecord>> {
        match self {
            Self::Trusted(user) => Some(user),
            _ => None,
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Validating => "validating",
            Self::Trusted(_) => "trusted",
        }
    }
}
