//! # Connection Handle
//!
//! One live push connection. The transport task owns the socket and pushes
//! `RawEvent` frames into the handle; listeners subscribe per event name.
//! Every frame is wrapped in an `Arc` once and shared by all listeners.
//!
//! Closing the handle cancels its `CancellationToken`. Listener streams check
//! the token before every delivery, so nothing is delivered after `close()`
//! returns, even frames already sitting in the channel buffer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// A transport-level frame: one named event with its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl RawEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// # Connection Handle
///
/// States *open* and *closed*; once closed, never reused.
pub struct ConnectionHandle {
    id: u64,
    endpoint: String,
    sender: broadcast::Sender<Arc<RawEvent>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl ConnectionHandle {
    /// Creates an open handle. `endpoint` is a printable description of the
    /// peer and must not contain the credential.
    pub fn new(endpoint: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            endpoint: endpoint.into(),
            sender,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Closes the handle. Returns `true` only for the call that performed the
    /// transition.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        log::debug!("Connection #{} to {} closed.", self.id, self.endpoint);
        true
    }

    /// Resolves once the handle is closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Hands one frame to the listeners. Dropped silently once closed.
    pub fn dispatch(&self, event: RawEvent) {
        if !self.is_open() {
            return;
        }
        if self.sender.send(Arc::new(event)).is_err() {
            log::trace!("Connection #{}: frame dropped, no listeners.", self.id);
        }
    }

    /// Number of attached listener streams.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// # Listen
    ///
    /// Payloads of the named event, in arrival order. Frames with other names
    /// are skipped. The stream ends when the handle is closed; a closed handle
    /// yields an empty stream.
    ///
    /// A listener that falls more than the channel capacity behind loses the
    /// oldest frames; the loss is logged and the stream continues.
    pub fn listen(&self, event: &str) -> BoxStream<'static, String> {
        if !self.is_open() {
            return stream::empty().boxed();
        }
        let state = ListenState {
            receiver: self.sender.subscribe(),
            cancel: self.cancel.clone(),
            event: event.to_string(),
            handle_id: self.id,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                let received = tokio::select! {
                    biased;
                    _ = state.cancel.cancelled() => return None,
                    received = state.receiver.recv() => received,
                };
                match received {
                    Ok(frame) if frame.event == state.event => {
                        let payload = frame.data.clone();
                        return Some((payload, state));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!(
                            "Connection #{}: '{}' listener lagged, {} frames lost.",
                            state.handle_id,
                            state.event,
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

struct ListenState {
    receiver: broadcast::Receiver<Arc<RawEvent>>,
    cancel: CancellationToken,
    event: String,
    handle_id: u64,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
