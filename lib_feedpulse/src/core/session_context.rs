//! # Session Context
//!
//! Wires the session pipeline together and runs it. Owns the validator, the
//! navigation guard, the post-login listeners and the logout debouncer;
//! nothing in here is global.
//!
//! `run` is the event loop. It multiplexes route changes, storage changes and
//! pending validations, so route changes keep being handled while a round trip
//! is in flight.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use futures_util::FutureExt;
use mockable::Clock;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::debounce::Debouncer;
use crate::core::navigation_guard::{GuardDecision, NavigationGuard};
use crate::core::post_login::{LocaleRedirect, ShareServiceActivator, ThemeApplier};
use crate::core::session_validator::{SessionValidator, Subscription, ValidationOutcome};
use crate::core::settings::SessionSettings;
use crate::error::SessionError;
use crate::models::{RouteChange, SessionState};
use crate::ports::{Navigator, Presentation, SessionApi, StorageChange, UserStore};

/// The outside world the session pipeline talks to.
#[derive(Clone)]
pub struct SessionPorts {
    pub api: Arc<dyn SessionApi>,
    pub store: Arc<dyn UserStore>,
    pub navigator: Arc<dyn Navigator>,
    pub presentation: Arc<dyn Presentation>,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

pub struct SessionContext {
    validator: Arc<SessionValidator>,
    guard: Arc<NavigationGuard>,
    logout: Debouncer,
    storage_changes: Mutex<Option<broadcast::Receiver<StorageChange>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SessionContext {
    pub fn new(ports: SessionPorts, settings: &SessionSettings) -> Self {
        // Subscribe before anything can write, so no change is missed.
        let storage_changes = ports.store.subscribe();

        let validator = Arc::new(SessionValidator::new(
            ports.api,
            Arc::clone(&ports.store),
            ports.clock,
            settings,
        ));
        let guard = Arc::new(NavigationGuard::new(
            Arc::clone(&ports.navigator),
            validator.watch(),
            settings.routes.clone(),
        ));

        let subscriptions = vec![
            validator.subscribe(guard.clone()),
            validator.subscribe(Arc::new(LocaleRedirect::new(ports.navigator, settings.ui_locale.clone()))),
            validator.subscribe(Arc::new(ThemeApplier::new(Arc::clone(&ports.presentation)))),
            validator.subscribe(Arc::new(ShareServiceActivator::new(ports.presentation))),
        ];

        Self {
            validator,
            guard,
            logout: Debouncer::new(settings.logout_debounce()),
            storage_changes: Mutex::new(Some(storage_changes)),
            subscriptions: Mutex::new(subscriptions),
        }
    }

    pub fn validator(&self) -> &Arc<SessionValidator> {
        &self.validator
    }

    pub fn guard(&self) -> &Arc<NavigationGuard> {
        &self.guard
    }

    pub fn state(&self) -> SessionState {
        self.validator.state()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.validator.watch()
    }

    /// Loads the stored user and, when there is none, applies the
    /// unauthenticated rule to the route the app started on.
    pub async fn start(&self) -> Result<ValidationOutcome, SessionError> {
        let outcome = self.validator.load_stored().await;
        if matches!(outcome, Ok(ValidationOutcome::Absent)) {
            self.guard.enforce();
        }
        outcome
    }

    /// Feeds one route-change notification to the guard. A logout decision is
    /// debounced.
    pub fn on_route_change(&self, change: &RouteChange) -> GuardDecision {
        let decision = self.guard.on_route_change(change);
        if decision == GuardDecision::Logout {
            self.request_logout();
        }
        decision
    }

    pub async fn on_storage_change(&self, change: &StorageChange) -> Result<ValidationOutcome, SessionError> {
        self.validator.on_storage_change(change).await
    }

    /// Logs out after the debounce window; repeated requests inside the window
    /// collapse to one.
    pub fn request_logout(&self) {
        let validator = Arc::clone(&self.validator);
        self.logout.call(async move {
            validator.logout().await;
        });
    }

    /// # Run
    ///
    /// Starts with `start()` and then serves route and storage changes until
    /// `shutdown` is cancelled. Ends with `shutdown()`.
    pub async fn run<S>(&self, routes: S, shutdown: CancellationToken)
    where
        S: Stream<Item = RouteChange> + Send,
    {
        futures_util::pin_mut!(routes);
        let mut storage = self.take_storage_changes();
        let mut pending: FuturesUnordered<BoxFuture<'_, Result<ValidationOutcome, SessionError>>> =
            FuturesUnordered::new();
        pending.push(self.start().boxed());

        let mut routes_done = false;
        let mut storage_done = false;
        log::info!("Session loop started.");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(result) = pending.next(), if !pending.is_empty() => log_outcome(&result),
                change = routes.next(), if !routes_done => match change {
                    Some(change) => {
                        self.on_route_change(&change);
                    }
                    None => {
                        log::debug!("Route notifications ended.");
                        routes_done = true;
                    }
                },
                change = storage.recv(), if !storage_done => match change {
                    Ok(change) if change.external_change => {
                        let validator = &self.validator;
                        pending.push(async move { validator.on_storage_change(&change).await }.boxed());
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Missed {skipped} storage notifications.");
                    }
                    Err(RecvError::Closed) => storage_done = true,
                },
            }
        }

        log::info!("Session loop stopped.");
        self.shutdown();
    }

    /// Drops pending debounced calls and releases every listener.
    pub fn shutdown(&self) {
        self.logout.cancel();
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn take_storage_changes(&self) -> broadcast::Receiver<StorageChange> {
        self.storage_changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.validator.store().subscribe())
    }
}

fn log_outcome(result: &Result<ValidationOutcome, SessionError>) {
    match result {
        Ok(ValidationOutcome::Trusted(user)) => log::debug!("Validation finished: trusted '{}'.", user.login),
        Ok(outcome) => log::debug!("Validation finished: {outcome:?}."),
        Err(err) => log::warn!("Validation failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoginPrompt, NavigationTarget, ProfileData, RouteParams, UserRecord, ValidationResponse};
    use crate::storage::MemoryUserStore;
    use crate::test_support::{MutableClock, RecordingNavigator, RecordingPresentation, ScriptedSessionApi};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tokio::sync::{mpsc, Notify};

    struct Fixture {
        ctx: Arc<SessionContext>,
        api: Arc<ScriptedSessionApi>,
        store: Arc<MemoryUserStore>,
        navigator: Arc<RecordingNavigator>,
        presentation: Arc<RecordingPresentation>,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(ScriptedSessionApi::default());
        let store = Arc::new(MemoryUserStore::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let presentation = Arc::new(RecordingPresentation::default());
        let clock = Arc::new(MutableClock::new(Utc.with_ymd_and_hms(2024, 6, 16, 12, 0, 0).unwrap()));
        let ports = SessionPorts {
            api: api.clone(),
            store: store.clone(),
            navigator: navigator.clone(),
            presentation: presentation.clone(),
            clock: clock.clone(),
        };
        let ctx = Arc::new(SessionContext::new(ports, &SessionSettings::default()));
        Fixture {
            ctx,
            api,
            store,
            navigator,
            presentation,
        }
    }

    fn fresh_user() -> UserRecord {
        UserRecord {
            login: "jdoe".into(),
            auth_time: Some(Utc.with_ymd_and_hms(2024, 6, 16, 11, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    fn login_from(url: &str) -> NavigationTarget {
        let mut params = RouteParams::new();
        params.insert("url".into(), url.into());
        NavigationTarget::route_with("login-from", params)
    }

    async fn settle(navigator: &RecordingNavigator, count: usize) {
        for _ in 0..100 {
            if navigator.navigations().len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn start_without_stored_user_redirects_deep_link() {
        let f = fixture();
        f.navigator.activate("app");
        f.navigator.activate("feed-base");
        f.navigator.set_path("/feed/all");

        assert_eq!(f.ctx.start().await.unwrap(), ValidationOutcome::Absent);
        assert_eq!(f.navigator.navigations(), vec![login_from("$2Ffeed$2Fall")]);
    }

    #[tokio::test]
    async fn rejection_on_feed_base_goes_to_login_from() {
        let f = fixture();
        f.navigator.activate("app");
        f.navigator.activate("feed-base");
        f.navigator.set_path("/feed/all");
        f.store.put(Some(fresh_user()));
        f.api.push_response(Ok(ValidationResponse::rejected()));

        assert_eq!(f.ctx.start().await.unwrap(), ValidationOutcome::Rejected);
        assert_eq!(f.navigator.navigations(), vec![login_from("$2Ffeed$2Fall")]);
        assert_eq!(f.store.peek(), None);
    }

    #[tokio::test]
    async fn acceptance_on_login_from_returns_to_decoded_url() {
        let f = fixture();
        f.navigator.activate_with("login-from", [("url", "$2Ffeed$2Ftag$2Frust")]);
        f.store.put(Some(fresh_user()));
        let server_user = UserRecord {
            login: "jdoe".into(),
            profile_data: Some(ProfileData {
                theme: Some("teal".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        f.api.push_response(Ok(ValidationResponse::accepted(server_user, Vec::<String>::new())));

        assert!(matches!(f.ctx.start().await.unwrap(), ValidationOutcome::Trusted(_)));
        assert_eq!(f.navigator.navigations(), vec![NavigationTarget::Path("/feed/tag/rust".into())]);
        assert_eq!(f.presentation.themes(), vec!["teal".to_string()]);
        assert!(f.ctx.state().is_trusted());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_logout_routes_collapse_to_one_call() {
        let f = fixture();
        f.navigator.activate("logout");

        for _ in 0..4 {
            assert_eq!(f.ctx.on_route_change(&RouteChange::activated("logout")), GuardDecision::Logout);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(f.api.logout_calls(), 1);
        settle(&f.navigator, 1).await;
        assert_eq!(f.navigator.navigations().last(), Some(&NavigationTarget::route("login")));
    }

    #[test]
    fn logout_route_outside_a_runtime_is_reported_without_scheduling() {
        let f = fixture();
        f.navigator.activate("logout");

        assert_eq!(f.ctx.on_route_change(&RouteChange::activated("logout")), GuardDecision::Logout);
        assert_eq!(f.api.logout_calls(), 0);
        assert!(f.ctx.state().is_unauthenticated());
    }

    #[tokio::test]
    async fn route_changes_are_served_while_validating() {
        let f = fixture();
        let gate = Arc::new(Notify::new());
        f.api.set_gate(gate.clone());
        f.api.push_response(Ok(ValidationResponse::rejected()));
        f.store.put(Some(fresh_user()));
        f.navigator.activate("app");
        f.navigator.activate("feed-base");
        f.navigator.set_path("/feed/all");

        let (routes_tx, routes_rx) = mpsc::unbounded_channel::<RouteChange>();
        let routes = futures_util::stream::unfold(routes_rx, |mut rx| async move {
            rx.recv().await.map(|change| (change, rx))
        });
        let shutdown = CancellationToken::new();
        let running = {
            let ctx = Arc::clone(&f.ctx);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { ctx.run(routes, shutdown).await })
        };

        while f.api.validate_calls() == 0 {
            tokio::task::yield_now().await;
        }
        routes_tx.send(RouteChange::activated("feed-base")).unwrap();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(f.ctx.state().is_validating());
        assert!(f.navigator.navigations().is_empty());
        assert_eq!(f.ctx.guard().last_route().map(|r| r.name), Some("feed-base".to_string()));

        gate.notify_one();
        settle(&f.navigator, 1).await;
        assert_eq!(f.navigator.navigations(), vec![login_from("$2Ffeed$2Fall")]);

        shutdown.cancel();
        running.await.unwrap();
    }

    #[tokio::test]
    async fn external_storage_write_is_validated_by_the_loop() {
        let f = fixture();
        f.navigator.activate("login");
        let shutdown = CancellationToken::new();
        let running = {
            let ctx = Arc::clone(&f.ctx);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { ctx.run(futures_util::stream::pending::<RouteChange>(), shutdown).await })
        };

        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.navigator.prompts(), vec![LoginPrompt::Shown]);

        f.api.push_response(Ok(ValidationResponse::accepted(fresh_user(), Vec::<String>::new())));
        f.store.write_external(Some(fresh_user()));

        settle(&f.navigator, 1).await;
        assert_eq!(f.api.validate_calls(), 1);
        assert!(f.ctx.state().is_trusted());
        let mut params = RouteParams::new();
        params.insert("tagOrId".into(), "all".into());
        assert_eq!(f.navigator.navigations(), vec![NavigationTarget::route_with("feed", params)]);

        shutdown.cancel();
        running.await.unwrap();
    }
}
