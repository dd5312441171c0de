//! # Stream Manager
//!
//! Turns the credential sequence into a sequence of live connection handles.
//! For every emission the previous handle is closed first, even when the new
//! credential is empty; a new handle is opened only for a non-empty
//! credential. The current handle lives in a `watch` channel, which gives
//! subscribers replay-last-value semantics for free.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::watch;

use crate::core::connection::ConnectionHandle;
use crate::models::Credential;
use crate::ports::Connector;

/// Replay-last stream of live handles. `null` is never yielded.
pub type HandleStream = BoxStream<'static, Arc<ConnectionHandle>>;

pub struct StreamManager {
    connector: Arc<dyn Connector>,
    current: watch::Sender<Option<Arc<ConnectionHandle>>>,
    // Serializes close-then-open so two transitions never interleave.
    transition: Mutex<()>,
}

impl StreamManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            connector,
            current,
            transition: Mutex::new(()),
        }
    }

    /// # Apply
    ///
    /// Performs one credential transition: close the previous handle, then
    /// open a new one if `credential` is non-empty.
    pub fn apply(&self, credential: &Credential) {
        let _transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.current.borrow().clone();
        if let Some(previous) = previous {
            if previous.close() {
                log::info!("Closed push connection #{} ({}).", previous.id(), previous.endpoint());
            }
        }

        let next = if credential.is_empty() {
            log::debug!("Empty credential, no push connection.");
            None
        } else {
            let handle = self.connector.open(credential);
            log::info!("Opened push connection #{} ({}).", handle.id(), handle.endpoint());
            Some(handle)
        };
        self.current.send_replace(next);
    }

    /// Drives `apply` from a credential source. The current handle is closed
    /// when the source ends.
    pub async fn run<S>(&self, credentials: S)
    where
        S: Stream<Item = Credential>,
    {
        futures_util::pin_mut!(credentials);
        while let Some(credential) = credentials.next().await {
            self.apply(&credential);
        }
        log::debug!("Credential source ended.");
        self.shutdown();
    }

    /// Closes the current handle and holds `null`.
    pub fn shutdown(&self) {
        self.apply(&Credential::none());
    }

    /// The live handle, if any.
    pub fn current(&self) -> Option<Arc<ConnectionHandle>> {
        self.current.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Arc<ConnectionHandle>>> {
        self.current.subscribe()
    }

    /// Handles from now on, starting with the current one if present.
    pub fn subscribe(&self) -> HandleStream {
        handle_stream(self.watch())
    }
}

/// Adapts a handle `watch` receiver into a stream that replays the current
/// handle and then yields every later non-null one.
pub fn handle_stream(receiver: watch::Receiver<Option<Arc<ConnectionHandle>>>) -> HandleStream {
    stream::unfold((receiver, true), |(mut receiver, first)| async move {
        if first {
            let current = receiver.borrow_and_update().clone();
            if let Some(handle) = current {
                return Some((handle, (receiver, false)));
            }
        }
        loop {
            receiver.changed().await.ok()?;
            let next = receiver.borrow_and_update().clone();
            if let Some(handle) = next {
                return Some((handle, (receiver, false)));
            }
        }
    })
    .boxed()
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("current", &*self.current.borrow())
            .finish_non_exhaustive()
    }
}
