//! # Event Router
//!
//! Attaches named-channel listeners to the current connection handle and
//! decodes each payload into its typed event. Every call to `feed_updates()`
//! or `article_states()` produces an independent stream that follows the
//! handle sequence: when a new handle appears the listener on the old one is
//! dropped (the old handle is already closed) and a listener on the new one
//! takes its place.
//!
//! Decode failures are terminal for the stream they occur on, and only for
//! that stream.

use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::core::connection::ConnectionHandle;
use crate::core::stream_manager::{handle_stream, HandleStream, StreamManager};
use crate::error::StreamError;
use crate::models::events::decode_payload;
use crate::models::{
    ArticleStateEvent, DomainEvent, FeedUpdateEvent, ARTICLE_STATE_EVENT, FEED_UPDATE_EVENT,
};

/// A typed event stream. Effectively infinite; ends after its first error.
pub type EventStream<T> = BoxStream<'static, Result<T, StreamError>>;

#[derive(Clone)]
pub struct EventRouter {
    handles: watch::Receiver<Option<Arc<ConnectionHandle>>>,
}

impl EventRouter {
    pub fn new(handles: watch::Receiver<Option<Arc<ConnectionHandle>>>) -> Self {
        Self { handles }
    }

    pub fn from_manager(manager: &StreamManager) -> Self {
        Self::new(manager.watch())
    }

    pub fn feed_updates(&self) -> EventStream<FeedUpdateEvent> {
        self.channel(FEED_UPDATE_EVENT)
    }

    pub fn article_states(&self) -> EventStream<ArticleStateEvent> {
        self.channel(ARTICLE_STATE_EVENT)
    }

    /// Both channels merged. No ordering holds between the two.
    pub fn events(&self) -> EventStream<DomainEvent> {
        let updates = self.feed_updates().map(|item| item.map(DomainEvent::FeedUpdate));
        let states = self.article_states().map(|item| item.map(DomainEvent::ArticleState));
        stream::select(updates, states).boxed()
    }

    fn channel<T>(&self, event: &'static str) -> EventStream<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut handles = handle_stream(self.handles.clone());
        // Attach to the current handle now, so nothing dispatched between this
        // call and the first poll is missed.
        let listener = handles
            .next()
            .now_or_never()
            .flatten()
            .map(|handle| handle.listen(event));

        let state = ChannelState {
            event,
            handles,
            handles_done: false,
            listener,
            failed: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.failed {
                return None;
            }
            loop {
                let step = match state.listener.as_mut() {
                    Some(listener) => tokio::select! {
                        biased;
                        handle = state.handles.next(), if !state.handles_done => Step::Handle(handle),
                        payload = listener.next() => Step::Payload(payload),
                    },
                    None if state.handles_done => return None,
                    None => Step::Handle(state.handles.next().await),
                };

                match step {
                    Step::Handle(Some(handle)) => {
                        log::debug!("'{}' listener moved to connection #{}.", state.event, handle.id());
                        state.listener = Some(handle.listen(state.event));
                    }
                    Step::Handle(None) => state.handles_done = true,
                    Step::Payload(Some(payload)) => {
                        let decoded = decode_payload::<T>(state.event, &payload);
                        if let Err(err) = &decoded {
                            log::warn!("{err}");
                            state.failed = true;
                        }
                        return Some((decoded, state));
                    }
                    // Handle closed; wait for the next one.
                    Step::Payload(None) => state.listener = None,
                }
            }
        })
        .boxed()
    }
}

struct ChannelState {
    event: &'static str,
    handles: HandleStream,
    handles_done: bool,
    listener: Option<BoxStream<'static, String>>,
    failed: bool,
}

enum Step {
    Handle(Option<Arc<ConnectionHandle>>),
    Payload(Option<String>),
}
