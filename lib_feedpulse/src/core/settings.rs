//! # Settings
//!
//! Plain, serde-deserializable configuration for the two pipelines. Every
//! field has a default so a partial JSON document is a valid configuration.

use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Route names the navigation guard works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTable {
    pub login: String,
    pub login_from: String,
    pub logout: String,
    /// The application shell. Inactive means the landing route is shown.
    pub app_root: String,
    /// Areas whose content must never be visible without a trusted session.
    pub protected_areas: Vec<String>,
    pub default_view: String,
    pub default_view_param: (String, String),
    /// Parameter of `login_from` that carries the encoded return path.
    pub return_param: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            login: "login".into(),
            login_from: "login-from".into(),
            logout: "logout".into(),
            app_root: "app".into(),
            protected_areas: vec!["feed-base".into(), "settings-base".into()],
            default_view: "feed".into(),
            default_view_param: ("tagOrId".into(), "all".into()),
            return_param: "url".into(),
        }
    }
}

impl RouteTable {
    pub fn is_login_route(&self, name: &str) -> bool {
        name == self.login || name == self.login_from
    }
}

/// # Session Settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Age after which a stored user is discarded without a round trip.
    pub user_ttl_days: u32,
    /// Window in which repeated logout routes collapse into one call.
    pub logout_debounce_ms: u64,
    /// Locale the UI is currently served in (`en`, `de`, ...).
    pub ui_locale: Option<String>,
    pub routes: RouteTable,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_ttl_days: 15,
            logout_debounce_ms: 100,
            ui_locale: None,
            routes: RouteTable::default(),
        }
    }
}

impl SessionSettings {
    pub fn user_ttl(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.user_ttl_days))
    }

    pub fn logout_debounce(&self) -> Duration {
        Duration::from_millis(self.logout_debounce_ms)
    }
}

/// # Stream Settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Absolute base URL of the server, e.g. `https://reader.example/`.
    pub base_url: String,
    pub events_path: String,
    /// Per-handle fan-out buffer. Listeners further behind lose frames.
    pub channel_capacity: usize,
    /// Timeout for session API requests. The push connection has none.
    pub request_timeout_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".into(),
            events_path: "api/v2/events".into(),
            channel_capacity: 256,
            request_timeout_secs: 30,
        }
    }
}

impl StreamSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
