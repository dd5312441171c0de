//! # Session Validator
//!
//! Owns the session state machine:
//!
//! ```text
//! Unauthenticated --validate--> Validating --Auth:true--> Trusted
//!        ^                          |                       |
//!        +------ Auth:false --------+                       |
//!        +------ logout / rejection ------------------------+
//! ```
//!
//! A failed round trip (transport error) returns to whatever state the
//! validation started from, so a trusted session survives a flaky
//! re-validation.
//!
//! A user loaded from storage is only a candidate. It becomes the current user
//! after the server confirms it, and never before. At most one round trip is
//! in flight: the `Validating` check and the transition into it happen in one
//! `watch::Sender::send_if_modified` call.
//!
//! Logout bumps an epoch counter inside the same atomic update that clears the
//! state. A response that comes back under an older epoch is discarded, and so
//! is one whose user was persisted while a logout ran: the epoch is checked
//! again, under the publication lock, before `Trusted` reaches listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::TimeDelta;
use mockable::Clock;
use tokio::sync::watch;

use crate::core::settings::SessionSettings;
use crate::error::SessionError;
use crate::models::{ProfileData, SessionState, UserRecord, ValidationResponse};
use crate::ports::{SessionApi, StorageChange, UserStore};

/// How a load or validation request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Nothing usable to validate (missing, expired or unreadable).
    Absent,
    /// A round trip was already in flight, or the change was our own write.
    Ignored,
    Trusted(Arc<UserRecord>),
    Rejected,
    /// A logout happened while the round trip was in flight.
    Superseded,
}

/// A session transition, published to listeners after the state is updated.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Validating,
    Trusted(Arc<UserRecord>),
    Rejected,
    /// The validation call itself failed.
    Failed,
    LoggedOut,
}

/// Receives `SessionEvent`s. Called synchronously, in registration order.
/// Implementations must not call back into the validator from the callback.
pub trait SessionListener: Send + Sync {
    fn on_session_event(&self, event: &SessionEvent);
}

type ListenerList = Mutex<Vec<(u64, Arc<dyn SessionListener>)>>;

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut listeners = listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// # Session Validator
pub struct SessionValidator {
    api: Arc<dyn SessionApi>,
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    ttl: TimeDelta,
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
    listeners: Arc<ListenerList>,
    next_listener_id: AtomicU64,
    // Held while events are delivered; orders `Trusted` against `LoggedOut`.
    publish: Mutex<()>,
}

impl SessionValidator {
    pub fn new(
        api: Arc<dyn SessionApi>,
        store: Arc<dyn UserStore>,
        clock: Arc<dyn Clock + Send + Sync>,
        settings: &SessionSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            api,
            store,
            clock,
            ttl: settings.user_ttl(),
            state,
            epoch: AtomicU64::new(0),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(1),
            publish: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The trusted user, if any.
    pub fn current_user(&self) -> Option<Arc<UserRecord>> {
        self.state.borrow().user().cloned()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) -> Subscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// # Load Stored
    ///
    /// Reads the stored candidate and validates it. Missing, expired and
    /// unreadable records end as `Absent` with no round trip; an expired
    /// record is also cleared from storage.
    pub async fn load_stored(&self) -> Result<ValidationOutcome, SessionError> {
        if self.state.borrow().is_validating() {
            log::debug!("Validation in flight, stored user load ignored.");
            return Ok(ValidationOutcome::Ignored);
        }

        let stored = match self.store.load().await {
            Ok(stored) => stored,
            Err(err) => {
                log::warn!("Stored user unreadable, treating it as absent: {err}");
                None
            }
        };
        self.validate_candidate(stored).await
    }

    /// # Storage Change
    ///
    /// Re-validates after a write made somewhere else. Our own writes are
    /// ignored. An external clear while trusted ends the local session too.
    pub async fn on_storage_change(&self, change: &StorageChange) -> Result<ValidationOutcome, SessionError> {
        if !change.external_change {
            return Ok(ValidationOutcome::Ignored);
        }
        if self.state.borrow().is_validating() {
            log::debug!("Validation in flight, external storage change ignored.");
            return Ok(ValidationOutcome::Ignored);
        }

        match &change.value {
            Some(candidate) => {
                log::info!("Stored user changed externally, re-validating '{}'.", candidate.login);
                self.validate_candidate(Some(candidate.clone())).await
            }
            None => {
                let was_trusted = self.state.send_if_modified(|state| {
                    if state.is_trusted() {
                        self.epoch.fetch_add(1, Ordering::SeqCst);
                        *state = SessionState::Unauthenticated;
                        true
                    } else {
                        false
                    }
                });
                if was_trusted {
                    log::info!("Stored user cleared externally, ending local session.");
                    self.notify(&SessionEvent::LoggedOut);
                }
                Ok(ValidationOutcome::Absent)
            }
        }
    }

    async fn validate_candidate(&self, candidate: Option<UserRecord>) -> Result<ValidationOutcome, SessionError> {
        let Some(candidate) = candidate else {
            return Ok(ValidationOutcome::Absent);
        };

        if candidate.is_expired(self.clock.utc(), self.ttl) {
            log::info!("Stored user '{}' is past its TTL, discarding.", candidate.login);
            if let Err(err) = self.store.save(None).await {
                log::warn!("Failed to clear expired user: {err}");
            }
            return Ok(ValidationOutcome::Absent);
        }

        self.validate(candidate).await
    }

    /// # Validate
    ///
    /// Submits `candidate` to the server. Not started while another round trip
    /// is in flight. Rejection is an outcome; `Err` means the call itself
    /// failed, in which case the state returns to what it was before the
    /// round trip and the stored record is kept.
    pub async fn validate(&self, candidate: UserRecord) -> Result<ValidationOutcome, SessionError> {
        let mut epoch = 0;
        let mut previous = SessionState::Unauthenticated;
        let started = self.state.send_if_modified(|state| {
            if state.is_validating() {
                return false;
            }
            epoch = self.epoch.load(Ordering::SeqCst);
            previous = std::mem::replace(state, SessionState::Validating);
            true
        });
        if !started {
            log::debug!("Validation already in flight, '{}' not submitted.", candidate.login);
            return Ok(ValidationOutcome::Ignored);
        }
        log::debug!("Validating user '{}'.", candidate.login);
        self.notify(&SessionEvent::Validating);

        let response = match self.api.validate(Some(&candidate)).await {
            Ok(response) => response,
            Err(err) => {
                let kept = previous.label();
                if !self.finish(epoch, previous) {
                    return Ok(ValidationOutcome::Superseded);
                }
                log::warn!("Validation of '{}' failed, session stays {kept}: {err}", candidate.login);
                self.notify(&SessionEvent::Failed);
                return Err(err);
            }
        };

        if !response.auth {
            if !self.finish(epoch, SessionState::Unauthenticated) {
                return Ok(ValidationOutcome::Superseded);
            }
            log::info!("Server rejected user '{}'.", candidate.login);
            if let Err(err) = self.store.save(None).await {
                log::warn!("Failed to clear rejected user: {err}");
            }
            if !self.notify_current(epoch, &SessionEvent::Rejected) {
                return Ok(ValidationOutcome::Superseded);
            }
            return Ok(ValidationOutcome::Rejected);
        }

        let user = Arc::new(self.enrich(response, candidate));
        if !self.finish(epoch, SessionState::Trusted(Arc::clone(&user))) {
            log::debug!("Validation of '{}' superseded by logout.", user.login);
            return Ok(ValidationOutcome::Superseded);
        }
        log::info!("User '{}' trusted ({} capabilities).", user.login, user.capabilities.len());

        if let Err(err) = self.store.save(Some(&user)).await {
            log::warn!("Failed to persist validated user: {err}");
        }
        if !self.notify_current(epoch, &SessionEvent::Trusted(Arc::clone(&user))) {
            // The logout may have cleared storage before our save landed.
            log::debug!("Logout raced the save of '{}', clearing it again.", user.login);
            let newer_session = self.state.borrow().is_trusted();
            if !newer_session {
                if let Err(err) = self.store.save(None).await {
                    log::warn!("Failed to clear superseded user: {err}");
                }
            }
            return Ok(ValidationOutcome::Superseded);
        }
        Ok(ValidationOutcome::Trusted(user))
    }

    /// # Logout
    ///
    /// Clears the session unconditionally and supersedes any round trip in
    /// flight. The server notification is best effort.
    pub async fn logout(&self) {
        self.state.send_modify(|state| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::Unauthenticated;
        });
        log::info!("Logged out.");

        if let Err(err) = self.store.save(None).await {
            log::warn!("Failed to clear stored user on logout: {err}");
        }
        self.notify(&SessionEvent::LoggedOut);

        if let Err(err) = self.api.logout().await {
            log::warn!("Logout notification failed: {err}");
        }
    }

    // The server's record wins over the candidate; client-side fields are
    // always reset from the response.
    fn enrich(&self, response: ValidationResponse, candidate: UserRecord) -> UserRecord {
        let mut user = response.user.unwrap_or(candidate);
        user.auth_time = Some(self.clock.utc());
        user.capabilities = response.capabilities;
        user.profile_data.get_or_insert_with(ProfileData::default);
        user
    }

    /// Leaves `Validating` for `next`, unless a logout bumped the epoch since
    /// the round trip started.
    fn finish(&self, epoch: u64, next: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_validating() && self.epoch.load(Ordering::SeqCst) == epoch {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    fn notify(&self, event: &SessionEvent) {
        let _publishing = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        self.deliver(event);
    }

    /// Delivers `event` only if no logout happened since `epoch`. Returns
    /// whether it was delivered.
    fn notify_current(&self, epoch: u64, event: &SessionEvent) -> bool {
        let _publishing = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.deliver(event);
        true
    }

    fn deliver(&self, event: &SessionEvent) {
        let listeners: Vec<Arc<dyn SessionListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener.on_session_event(event);
        }
    }
}
