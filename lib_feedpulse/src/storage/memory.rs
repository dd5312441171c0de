use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::StorageError;
use crate::models::UserRecord;
use crate::ports::{StorageChange, UserStore};
use crate::storage::CHANGE_CAPACITY;

/// # Memory User Store
pub struct MemoryUserStore {
    slot: Mutex<Option<UserRecord>>,
    changes: broadcast::Sender<StorageChange>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryUserStore {
    pub fn new(initial: Option<UserRecord>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            slot: Mutex::new(initial),
            changes,
        }
    }

    /// Replaces the slot without any notification.
    pub fn put(&self, user: Option<UserRecord>) {
        *self.lock() = user;
    }

    pub fn peek(&self) -> Option<UserRecord> {
        self.lock().clone()
    }

    /// Replaces the slot as if another tab wrote it.
    pub fn write_external(&self, user: Option<UserRecord>) {
        self.replace(user, true);
    }

    fn replace(&self, user: Option<UserRecord>, external_change: bool) {
        *self.lock() = user.clone();
        // No subscribers is fine.
        let _ = self.changes.send(StorageChange {
            value: user,
            external_change,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<UserRecord>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn load(&self) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.peek())
    }

    async fn save(&self, user: Option<&UserRecord>) -> Result<(), StorageError> {
        self.replace(user.cloned(), false);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_carry_their_origin() {
        let store = MemoryUserStore::default();
        let mut changes = store.subscribe();
        let user = UserRecord {
            login: "jdoe".into(),
            ..Default::default()
        };

        store.save(Some(&user)).await.unwrap();
        store.write_external(None);

        let own = changes.recv().await.unwrap();
        assert_eq!(own.value.as_ref(), Some(&user));
        assert!(!own.external_change);

        let external = changes.recv().await.unwrap();
        assert_eq!(external.value, None);
        assert!(external.external_change);
        assert_eq!(store.load().await.unwrap(), None);
    }
}
