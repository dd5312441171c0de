//! # File User Store
//!
//! Keeps the user slot in a JSON file. Writes go to a sibling temp file that
//! is then renamed over the target, so readers never see half a record.
//!
//! Other processes can write the same file. `refresh()` compares the file with
//! what this store last read or wrote and reports a difference as an external
//! change; `spawn_poller` calls it on an interval. Every file access holds the
//! `last_seen` lock from the read or write until `last_seen` is updated, so a
//! poll can never compare a stale read against a newer write of our own.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::StorageError;
use crate::models::UserRecord;
use crate::ports::{StorageChange, UserStore};
use crate::storage::CHANGE_CAPACITY;

pub struct FileUserStore {
    path: PathBuf,
    changes: broadcast::Sender<StorageChange>,
    // Raw content last read or written; `None` when the file was absent.
    last_seen: Mutex<Option<String>>,
}

impl FileUserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            path: path.into(),
            changes,
            last_seen: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Refresh
    ///
    /// Re-reads the file and emits an external change if it differs from what
    /// this store last saw. Returns whether a change was emitted.
    pub async fn refresh(&self) -> Result<bool, StorageError> {
        let raw = {
            let mut last_seen = self.last_seen.lock().await;
            let raw = self.read_raw().await?;
            if *last_seen == raw {
                return Ok(false);
            }
            *last_seen = raw.clone();
            raw
        };

        let value = parse(raw.as_deref())?;
        log::debug!("User file {} changed externally.", self.path.display());
        let _ = self.changes.send(StorageChange {
            value,
            external_change: true,
        });
        Ok(true)
    }

    /// Polls `refresh` every `every` until `cancel` fires.
    pub fn spawn_poller(self: &Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so `load` runs first.
            ticker.tick().await;

            loop {
                // --- Phase 1: Wait for the next tick or shutdown ---
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // --- Phase 2: Compare the file with what we last saw ---
                if let Err(err) = store.refresh().await {
                    log::warn!("User file poll failed: {err}");
                }
            }
            log::debug!("User file poller for {} stopped.", store.path.display());
        })
    }

    async fn read_raw(&self) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_raw(&self, raw: Option<&str>) -> Result<(), StorageError> {
        match raw {
            Some(raw) => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let tmp = self.path.with_extension("tmp");
                tokio::fs::write(&tmp, raw).await?;
                tokio::fs::rename(&tmp, &self.path).await?;
            }
            None => match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            },
        }
        Ok(())
    }

}

fn parse(raw: Option<&str>) -> Result<Option<UserRecord>, StorageError> {
    match raw.map(str::trim) {
        None | Some("") | Some("null") => Ok(None),
        Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn load(&self) -> Result<Option<UserRecord>, StorageError> {
        let mut last_seen = self.last_seen.lock().await;
        let raw = self.read_raw().await?;
        *last_seen = raw.clone();
        parse(raw.as_deref())
    }

    async fn save(&self, user: Option<&UserRecord>) -> Result<(), StorageError> {
        let raw = user.map(serde_json::to_string).transpose()?;
        {
            let mut last_seen = self.last_seen.lock().await;
            self.write_raw(raw.as_deref()).await?;
            *last_seen = raw;
        }

        let _ = self.changes.send(StorageChange {
            value: user.cloned(),
            external_change: false,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(login: &str) -> UserRecord {
        UserRecord {
            login: login.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUserStore::new(dir.path().join("user.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_load_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUserStore::new(dir.path().join("nested").join("user.json"));

        store.save(Some(&user("jdoe"))).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(user("jdoe")));
        assert!(!store.path().with_extension("tmp").exists());

        store.save(None).await.unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn garbage_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileUserStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[tokio::test]
    async fn refresh_reports_only_foreign_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        let store = FileUserStore::new(&path);
        let mut changes = store.subscribe();

        store.save(Some(&user("mine"))).await.unwrap();
        assert!(!changes.recv().await.unwrap().external_change);
        assert!(!store.refresh().await.unwrap());

        std::fs::write(&path, serde_json::to_string(&user("theirs")).unwrap()).unwrap();
        assert!(store.refresh().await.unwrap());
        let change = changes.recv().await.unwrap();
        assert!(change.external_change);
        assert_eq!(change.value, Some(user("theirs")));

        assert!(!store.refresh().await.unwrap());
    }

    #[tokio::test]
    async fn poll_racing_our_own_save_is_not_external() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUserStore::new(dir.path().join("user.json"));
        let mut changes = store.subscribe();

        for round in 0..12 {
            let next = (round % 2 == 0).then(|| user(&format!("u{round}")));
            let (refreshed, saved) = tokio::join!(store.refresh(), store.save(next.as_ref()));
            saved.unwrap();
            assert!(!refreshed.unwrap(), "round {round}: own write reported as foreign");
        }

        while let Ok(change) = changes.try_recv() {
            assert!(!change.external_change, "{change:?}");
        }
    }
}
