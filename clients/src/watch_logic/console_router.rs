//! # Console Router
//!
//! A path router for the headless client. Paths map onto the route chain the
//! session guard expects:
//!
//! | Path                  | Active routes                    |
//! |-----------------------|----------------------------------|
//! | `/`                   | (landing, no shell)              |
//! | `/login`              | `login`                          |
//! | `/login/<url>`        | `login-from {url}`               |
//! | `/logout`             | `logout`                         |
//! | `/feed/<tagOrId>/...` | `app`, `feed-base`, `feed`       |
//! | `/settings/<section>` | `app`, `settings-base`, `settings` |
//! | anything else         | `app`                            |

use std::sync::{Mutex, PoisonError};

use futures_channel::mpsc::UnboundedSender;
use lib_feedpulse::ports::Navigator;
use lib_feedpulse::{LoginPrompt, NavigationError, NavigationTarget, RouteChange, RouteParams};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveRoute {
    name: String,
    params: RouteParams,
}

impl ActiveRoute {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: RouteParams::new(),
        }
    }

    fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct RouterState {
    path: String,
    chain: Vec<ActiveRoute>,
    prompt: Option<LoginPrompt>,
}

/// Resolves a path into its active route chain, leaf last.
fn resolve(path: &str) -> Vec<ActiveRoute> {
    let trimmed = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [] => Vec::new(),
        ["login"] => vec![ActiveRoute::new("login")],
        ["login", url, ..] => vec![ActiveRoute::new("login-from").with_param("url", url)],
        ["logout", ..] => vec![ActiveRoute::new("logout")],
        ["feed", rest @ ..] => vec![
            ActiveRoute::new("app"),
            ActiveRoute::new("feed-base"),
            ActiveRoute::new("feed").with_param("tagOrId", rest.first().copied().unwrap_or("all")),
        ],
        ["settings", rest @ ..] => vec![
            ActiveRoute::new("app"),
            ActiveRoute::new("settings-base"),
            ActiveRoute::new("settings").with_param("section", rest.first().copied().unwrap_or("general")),
        ],
        _ => vec![ActiveRoute::new("app")],
    }
}

/// Builds the path for a named route.
fn path_for(name: &str, params: &RouteParams) -> Option<String> {
    let param = |key: &str| params.get(key).map(String::as_str).filter(|v| !v.is_empty());
    match name {
        "login" => Some("/login".to_string()),
        "login-from" => param("url").map(|url| format!("/login/{url}")),
        "logout" => Some("/logout".to_string()),
        "feed" => Some(format!("/feed/{}", param("tagOrId").unwrap_or("all"))),
        "settings" => Some(format!("/settings/{}", param("section").unwrap_or("general"))),
        _ => None,
    }
}

/// # Console Navigator
///
/// Holds the current path, answers the guard's queries against it, and
/// reports every navigation as one `RouteChange` for its leaf route.
pub struct ConsoleNavigator {
    state: Mutex<RouterState>,
    changes: UnboundedSender<RouteChange>,
}

impl ConsoleNavigator {
    pub fn new(changes: UnboundedSender<RouteChange>) -> Self {
        Self {
            state: Mutex::new(RouterState::default()),
            changes,
        }
    }

    /// Opens `path` as if the user had typed it.
    pub fn open(&self, path: &str) {
        let path = if path.is_empty() { "/" } else { path };
        self.apply(path.to_string());
    }

    /// The last login prompt state set by the guard.
    pub fn login_prompt(&self) -> Option<LoginPrompt> {
        self.lock().prompt
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, path: String) {
        let chain = resolve(&path);
        let change = match chain.last() {
            Some(leaf) => RouteChange {
                name: leaf.name.clone(),
                params: leaf.params.clone(),
                active: true,
            },
            None => RouteChange::activated("splash"),
        };

        {
            let mut state = self.lock();
            log::info!("Navigated: '{}' -> '{}'.", state.path, path);
            state.path = path;
            state.chain = chain;
        }

        if self.changes.unbounded_send(change).is_err() {
            log::debug!("Route change dropped, nobody is listening.");
        }
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate_to(&self, target: NavigationTarget) -> Result<(), NavigationError> {
        match target {
            NavigationTarget::Route { name, params } => {
                let path = path_for(&name, &params).ok_or(NavigationError::Unroutable(name))?;
                self.apply(path);
            }
            NavigationTarget::Path(path) => {
                if !path.starts_with('/') {
                    return Err(NavigationError::Unroutable(path));
                }
                self.apply(path);
            }
            // No page to reload here; the path part is still honoured.
            NavigationTarget::Location(location) => {
                log::info!("Full page load requested for '{}'.", location);
                self.apply(location);
            }
        }
        Ok(())
    }

    fn is_active(&self, route: &str) -> bool {
        self.lock().chain.iter().any(|active| active.name == route)
    }

    fn route_param(&self, route: &str, name: &str) -> Option<String> {
        self.lock()
            .chain
            .iter()
            .find(|active| active.name == route)
            .and_then(|active| active.params.get(name).cloned())
    }

    fn current_path(&self) -> String {
        let state = self.lock();
        if state.chain.is_empty() { String::new() } else { state.path.clone() }
    }

    fn set_login_prompt(&self, prompt: LoginPrompt) {
        let mut state = self.lock();
        if state.prompt != Some(prompt) {
            match prompt {
                LoginPrompt::Shown => log::info!("Login required. Provide a token with --token."),
                LoginPrompt::InvalidCredentials => log::warn!("The server refused the stored credentials."),
                LoginPrompt::Hidden => log::debug!("Login prompt hidden."),
            }
        }
        state.prompt = Some(prompt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_channel::mpsc;

    fn names(path: &str) -> Vec<String> {
        resolve(path).into_iter().map(|r| r.name).collect()
    }

    #[test]
    fn resolves_paths_into_route_chains() {
        assert!(names("/").is_empty());
        assert_eq!(names("/login"), ["login"]);
        assert_eq!(names("/login/$2Ffeed$2Fall"), ["login-from"]);
        assert_eq!(names("/feed/all"), ["app", "feed-base", "feed"]);
        assert_eq!(names("/feed/42/article/7"), ["app", "feed-base", "feed"]);
        assert_eq!(names("/settings"), ["app", "settings-base", "settings"]);
        assert_eq!(names("/about"), ["app"]);
    }

    #[test]
    fn named_routes_round_trip_through_paths() {
        let (tx, mut rx) = mpsc::unbounded();
        let navigator = ConsoleNavigator::new(tx);

        let mut params = RouteParams::new();
        params.insert("url".into(), "$2Ffeed$2F12".into());
        navigator
            .navigate_to(NavigationTarget::route_with("login-from", params))
            .unwrap();

        assert_eq!(navigator.current_path(), "/login/$2Ffeed$2F12");
        assert!(navigator.is_active("login-from"));
        assert!(!navigator.is_active("app"));
        assert_eq!(navigator.route_param("login-from", "url").as_deref(), Some("$2Ffeed$2F12"));

        let change = rx.try_next().unwrap().unwrap();
        assert_eq!(change.name, "login-from");
        assert!(change.active);
    }

    #[test]
    fn landing_has_no_current_path() {
        let (tx, mut rx) = mpsc::unbounded();
        let navigator = ConsoleNavigator::new(tx);
        navigator.open("");
        assert_eq!(navigator.current_path(), "");
        assert_eq!(rx.try_next().unwrap().unwrap(), RouteChange::activated("splash"));
    }

    #[test]
    fn unknown_routes_are_refused() {
        let (tx, _rx) = mpsc::unbounded();
        let navigator = ConsoleNavigator::new(tx);
        assert_eq!(
            navigator.navigate_to(NavigationTarget::route("nowhere")),
            Err(NavigationError::Unroutable("nowhere".into()))
        );
        assert!(navigator.navigate_to(NavigationTarget::Path("relative".into())).is_err());
    }

    #[test]
    fn prompt_state_is_kept() {
        let (tx, _rx) = mpsc::unbounded();
        let navigator = ConsoleNavigator::new(tx);
        navigator.set_login_prompt(LoginPrompt::InvalidCredentials);
        assert_eq!(navigator.login_prompt(), Some(LoginPrompt::InvalidCredentials));
    }
}
