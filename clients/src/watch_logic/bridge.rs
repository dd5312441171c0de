use std::sync::{Mutex, PoisonError};

use futures_channel::mpsc::UnboundedSender;
use lib_feedpulse::{Credential, SessionEvent, SessionListener};

/// # Credential Bridge
///
/// Turns session transitions into the credential sequence the stream manager
/// consumes: the configured token once a user is trusted, the empty
/// credential when the session ends. Repeats are suppressed so a
/// re-validation does not reconnect the push channel.
pub struct CredentialBridge {
    token: Credential,
    credentials: UnboundedSender<Credential>,
    live: Mutex<bool>,
}

impl CredentialBridge {
    pub fn new(token: Credential, credentials: UnboundedSender<Credential>) -> Self {
        Self {
            token,
            credentials,
            live: Mutex::new(false),
        }
    }

    fn emit(&self, live: bool) {
        let mut current = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == live {
            return;
        }
        *current = live;

        let credential = if live { self.token.clone() } else { Credential::none() };
        log::debug!("Push credential now {:?}.", credential);
        if self.credentials.unbounded_send(credential).is_err() {
            log::debug!("Stream manager gone, credential dropped.");
        }
    }
}

impl SessionListener for CredentialBridge {
    fn on_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Trusted(_) => self.emit(true),
            SessionEvent::Rejected | SessionEvent::LoggedOut => self.emit(false),
            SessionEvent::Validating | SessionEvent::Failed => {}
        }
    }
}
