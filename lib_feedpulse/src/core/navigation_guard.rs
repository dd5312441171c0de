//! # Navigation Guard
//!
//! Keeps the visible route consistent with the session state. Every rule reads
//! the live session state and the live router state at evaluation time, so a
//! route change that lands while a validation is in flight is judged against
//! `Validating` and left alone.
//!
//! ## Rules:
//!
//! 1. **Unauthenticated** (`enforce`): on a login route only show the prompt;
//!    on the landing route or an empty path go to login; anywhere else go to
//!    `login-from` carrying the encoded current path.
//! 2. **Validated** (`on_validated`): from `login-from` return to the decoded
//!    path (default view on any failure); from plain login go to the default
//!    view; elsewhere stay put.
//! 3. **Rejected** (`connection_unauthorized`): protected area goes to
//!    `login-from`, other non-login routes go to login, and on the login route
//!    the prompt is flagged.
//! 4. **Logout route** (`on_route_change`): reported as `GuardDecision::Logout`
//!    for the caller to debounce.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::core::return_url::{decode_return_url, encode_return_url};
use crate::core::session_validator::{SessionEvent, SessionListener};
use crate::core::settings::RouteTable;
use crate::error::NavigationError;
use crate::models::{LoginPrompt, NavigationTarget, RouteChange, RouteIntent, RouteParams, SessionState};
use crate::ports::Navigator;

/// What the caller has to do after a route change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    None,
    Logout,
}

pub struct NavigationGuard {
    navigator: Arc<dyn Navigator>,
    session: watch::Receiver<SessionState>,
    routes: RouteTable,
    last_route: Mutex<Option<RouteIntent>>,
}

impl NavigationGuard {
    pub fn new(navigator: Arc<dyn Navigator>, session: watch::Receiver<SessionState>, routes: RouteTable) -> Self {
        Self {
            navigator,
            session,
            routes,
            last_route: Mutex::new(None),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// The last route reported active.
    pub fn last_route(&self) -> Option<RouteIntent> {
        self.last_route.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Rule 4, then rule 1.
    pub fn on_route_change(&self, change: &RouteChange) -> GuardDecision {
        if change.active {
            *self.last_route.lock().unwrap_or_else(PoisonError::into_inner) = Some(change.intent());
        }

        let nav = &self.navigator;
        if nav.is_active(&self.routes.logout) && !self.on_login_route() {
            log::debug!("Logout route active.");
            return GuardDecision::Logout;
        }

        self.enforce();
        GuardDecision::None
    }

    /// # Rule 1
    ///
    /// Only acts while `Unauthenticated`; `Validating` and `Trusted` leave the
    /// route alone.
    pub fn enforce(&self) {
        if !self.session.borrow().is_unauthenticated() {
            return;
        }

        if self.on_login_route() {
            self.navigator.set_login_prompt(LoginPrompt::Shown);
            return;
        }

        let path = self.navigator.current_path();
        if !self.navigator.is_active(&self.routes.app_root) || is_blank_path(&path) {
            self.go(NavigationTarget::route(&self.routes.login));
        } else {
            self.go(self.login_from(&path));
        }
    }

    /// # Rule 2
    pub fn on_validated(&self) {
        let routes = &self.routes;
        if self.navigator.is_active(&routes.login_from) {
            self.navigator.set_login_prompt(LoginPrompt::Hidden);

            let returned = self
                .navigator
                .route_param(&routes.login_from, &routes.return_param)
                .ok_or_else(|| NavigationError::MalformedReturnUrl(String::new()))
                .and_then(|encoded| decode_return_url(&encoded))
                .and_then(|path| self.navigator.navigate_to(NavigationTarget::Path(path)));

            if let Err(err) = returned {
                log::warn!("Cannot return after login ({err}), going to the default view.");
                self.go(self.default_view());
            }
        } else if self.navigator.is_active(&routes.login) {
            self.navigator.set_login_prompt(LoginPrompt::Hidden);
            self.go(self.default_view());
        }
    }

    /// # Rule 3
    pub fn connection_unauthorized(&self) {
        let on_protected_area = self
            .routes
            .protected_areas
            .iter()
            .any(|area| self.navigator.is_active(area));

        if on_protected_area {
            let path = self.navigator.current_path();
            self.go(self.login_from(&path));
        } else if !self.on_login_route() {
            self.go(NavigationTarget::route(&self.routes.login));
        } else {
            self.navigator.set_login_prompt(LoginPrompt::InvalidCredentials);
        }
    }

    /// Navigates to login on the next scheduling turn, after whatever route
    /// change triggered the logout has settled.
    pub fn schedule_login(&self) {
        let navigator = Arc::clone(&self.navigator);
        let target = NavigationTarget::route(&self.routes.login);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    navigate_logged(navigator.as_ref(), target);
                });
            }
            Err(_) => navigate_logged(navigator.as_ref(), target),
        }
    }

    fn on_login_route(&self) -> bool {
        self.navigator.is_active(&self.routes.login) || self.navigator.is_active(&self.routes.login_from)
    }

    fn login_from(&self, path: &str) -> NavigationTarget {
        let mut params = RouteParams::new();
        params.insert(self.routes.return_param.clone(), encode_return_url(path));
        NavigationTarget::route_with(&self.routes.login_from, params)
    }

    fn default_view(&self) -> NavigationTarget {
        let (key, value) = &self.routes.default_view_param;
        let mut params = RouteParams::new();
        params.insert(key.clone(), value.clone());
        NavigationTarget::route_with(&self.routes.default_view, params)
    }

    fn go(&self, target: NavigationTarget) {
        navigate_logged(self.navigator.as_ref(), target);
    }
}

impl SessionListener for NavigationGuard {
    fn on_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Validating => {}
            SessionEvent::Trusted(_) => self.on_validated(),
            SessionEvent::Rejected => self.connection_unauthorized(),
            SessionEvent::Failed => self.enforce(),
            SessionEvent::LoggedOut => self.schedule_login(),
        }
    }
}

fn is_blank_path(path: &str) -> bool {
    path.is_empty() || path == "/"
}

fn navigate_logged(navigator: &dyn Navigator, target: NavigationTarget) {
    log::debug!("Navigating to {target}.");
    if let Err(err) = navigator.navigate_to(target) {
        log::warn!("Navigation failed: {err}");
    }
}
