//! Test doubles for every port, shared by the unit tests and by
//! `project_tests` through the `test-support` feature.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use tokio::sync::Notify;

use crate::core::connection::ConnectionHandle;
use crate::core::session_validator::{SessionEvent, SessionListener};
use crate::error::{NavigationError, SessionError};
use crate::models::{Credential, LoginPrompt, NavigationTarget, RouteParams, UserRecord, ValidationResponse};
use crate::ports::{Connector, Navigator, Presentation, SessionApi};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.0) = now;
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}"),
        };
        *lock(&self.0) += delta;
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *lock(&self.0) += TimeDelta::seconds(seconds);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

struct OpenRecord {
    credential: String,
    handle: Arc<ConnectionHandle>,
    previous_all_closed: bool,
}

/// Opens in-memory handles and remembers every open.
#[derive(Default)]
pub struct FakeConnector {
    opened: Mutex<Vec<OpenRecord>>,
}

impl FakeConnector {
    pub fn open_count(&self) -> usize {
        lock(&self.opened).len()
    }

    pub fn opened_credentials(&self) -> Vec<String> {
        lock(&self.opened).iter().map(|r| r.credential.clone()).collect()
    }

    pub fn handles(&self) -> Vec<Arc<ConnectionHandle>> {
        lock(&self.opened).iter().map(|r| Arc::clone(&r.handle)).collect()
    }

    /// True when every earlier handle was already closed at each open.
    pub fn previous_closed_before_every_open(&self) -> bool {
        lock(&self.opened).iter().all(|r| r.previous_all_closed)
    }
}

impl Connector for FakeConnector {
    fn open(&self, credential: &Credential) -> Arc<ConnectionHandle> {
        let mut opened = lock(&self.opened);
        let previous_all_closed = opened.iter().all(|r| !r.handle.is_open());
        let handle = Arc::new(ConnectionHandle::new("fake://events", 64));
        opened.push(OpenRecord {
            credential: credential.as_str().to_string(),
            handle: Arc::clone(&handle),
            previous_all_closed,
        });
        handle
    }
}

/// Yields until `handle` has at least `count` listeners.
pub async fn wait_for_listeners(handle: &ConnectionHandle, count: usize) {
    while handle.listener_count() < count {
        tokio::task::yield_now().await;
    }
}

/// Answers validation calls from a queue; an empty queue answers `Auth:false`.
#[derive(Default)]
pub struct ScriptedSessionApi {
    responses: Mutex<VecDeque<Result<ValidationResponse, SessionError>>>,
    candidates: Mutex<Vec<Option<UserRecord>>>,
    validate_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    fail_logout: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedSessionApi {
    pub fn push_response(&self, response: Result<ValidationResponse, SessionError>) {
        lock(&self.responses).push_back(response);
    }

    /// Every later validation call waits for one `notify_one` on `gate`.
    pub fn set_gate(&self, gate: Arc<Notify>) {
        *lock(&self.gate) = Some(gate);
    }

    pub fn fail_logout(&self) {
        self.fail_logout.store(true, Ordering::SeqCst);
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn candidates(&self) -> Vec<Option<UserRecord>> {
        lock(&self.candidates).clone()
    }
}

#[async_trait]
impl SessionApi for ScriptedSessionApi {
    async fn validate(&self, candidate: Option<&UserRecord>) -> Result<ValidationResponse, SessionError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.candidates).push(candidate.cloned());

        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Ok(ValidationResponse::rejected()))
    }

    async fn logout(&self) -> Result<(), SessionError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(SessionError::Api("logout refused".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RouterState {
    active: BTreeSet<String>,
    params: BTreeMap<String, RouteParams>,
    path: String,
    navigations: Vec<NavigationTarget>,
    prompts: Vec<LoginPrompt>,
    refused: BTreeSet<String>,
}

/// A router whose state is set by the test. Navigations are recorded, not
/// applied.
#[derive(Default)]
pub struct RecordingNavigator {
    state: Mutex<RouterState>,
}

impl RecordingNavigator {
    pub fn activate(&self, route: &str) {
        lock(&self.state).active.insert(route.to_string());
    }

    pub fn activate_with<'a>(&self, route: &str, params: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let mut state = lock(&self.state);
        state.active.insert(route.to_string());
        state.params.insert(
            route.to_string(),
            params.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        );
    }

    pub fn deactivate(&self, route: &str) {
        let mut state = lock(&self.state);
        state.active.remove(route);
        state.params.remove(route);
    }

    pub fn set_path(&self, path: &str) {
        lock(&self.state).path = path.to_string();
    }

    /// Navigation to this path or route name fails with `Unroutable`.
    pub fn refuse(&self, target: &str) {
        lock(&self.state).refused.insert(target.to_string());
    }

    /// Every navigation attempt, including refused ones.
    pub fn navigations(&self) -> Vec<NavigationTarget> {
        lock(&self.state).navigations.clone()
    }

    pub fn prompts(&self) -> Vec<LoginPrompt> {
        lock(&self.state).prompts.clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, target: NavigationTarget) -> Result<(), NavigationError> {
        let mut state = lock(&self.state);
        let key = match &target {
            NavigationTarget::Route { name, .. } => name.clone(),
            NavigationTarget::Path(path) | NavigationTarget::Location(path) => path.clone(),
        };
        state.navigations.push(target);
        if state.refused.contains(&key) {
            return Err(NavigationError::Unroutable(key));
        }
        Ok(())
    }

    fn is_active(&self, route: &str) -> bool {
        lock(&self.state).active.contains(route)
    }

    fn route_param(&self, route: &str, name: &str) -> Option<String> {
        lock(&self.state).params.get(route)?.get(name).cloned()
    }

    fn current_path(&self) -> String {
        lock(&self.state).path.clone()
    }

    fn set_login_prompt(&self, prompt: LoginPrompt) {
        lock(&self.state).prompts.push(prompt);
    }
}

#[derive(Default)]
pub struct RecordingPresentation {
    themes: Mutex<Vec<String>>,
    share_services: Mutex<Vec<String>>,
}

impl RecordingPresentation {
    pub fn themes(&self) -> Vec<String> {
        lock(&self.themes).clone()
    }

    pub fn share_services(&self) -> Vec<String> {
        lock(&self.share_services).clone()
    }
}

impl Presentation for RecordingPresentation {
    fn apply_theme(&self, theme: &str) {
        lock(&self.themes).push(theme.to_string());
    }

    fn activate_share_service(&self, service: &str) {
        lock(&self.share_services).push(service.to_string());
    }
}

/// Remembers every session event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<SessionEvent> {
        lock(&self.events).clone()
    }
}

impl SessionListener for RecordingListener {
    fn on_session_event(&self, event: &SessionEvent) {
        lock(&self.events).push(event.clone());
    }
}
