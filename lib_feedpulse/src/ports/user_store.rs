use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::StorageError;
use crate::models::UserRecord;

/// A change of the persistent user slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    /// The slot content after the change.
    pub value: Option<UserRecord>,
    /// `true` when the write came from somewhere else (another tab, another
    /// process); `false` for writes made through this store.
    pub external_change: bool,
}

/// # User Store
///
/// A single slot holding an optional `UserRecord`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn load(&self) -> Result<Option<UserRecord>, StorageError>;

    /// Replaces the slot; `None` clears it. Emits a `StorageChange` with
    /// `external_change == false`.
    async fn save(&self, user: Option<&UserRecord>) -> Result<(), StorageError>;

    /// Change notifications for writes from any origin.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}
