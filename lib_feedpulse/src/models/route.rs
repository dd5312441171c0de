use std::collections::BTreeMap;
use std::fmt;

/// Named route parameters (`tagOrId`, `url`, ...).
pub type RouteParams = BTreeMap<String, String>;

/// # Route Intent
///
/// The currently active named route plus its parameters, as reported by the
/// external router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteIntent {
    pub name: String,
    pub params: RouteParams,
}

impl RouteIntent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: RouteParams::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One route-change notification: `(routeName, params, active)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteChange {
    pub name: String,
    pub params: RouteParams,
    pub active: bool,
}

impl RouteChange {
    pub fn activated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: RouteParams::new(),
            active: true,
        }
    }

    pub fn deactivated(name: impl Into<String>) -> Self {
        Self {
            active: false,
            ..Self::activated(name)
        }
    }

    pub fn intent(&self) -> RouteIntent {
        RouteIntent {
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }
}

/// Where a navigation correction sends the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    /// A named route with parameters.
    Route { name: String, params: RouteParams },
    /// An application path, resolved by the router.
    Path(String),
    /// A full page location change (used for locale switches).
    Location(String),
}

impl NavigationTarget {
    pub fn route(name: impl Into<String>) -> Self {
        Self::Route {
            name: name.into(),
            params: RouteParams::new(),
        }
    }

    pub fn route_with(name: impl Into<String>, params: RouteParams) -> Self {
        Self::Route {
            name: name.into(),
            params,
        }
    }

    /// The route name for `Route` targets.
    pub fn route_name(&self) -> Option<&str> {
        match self {
            Self::Route { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route { name, params } if params.is_empty() => write!(f, "route '{name}'"),
            Self::Route { name, params } => write!(f, "route '{name}' {params:?}"),
            Self::Path(path) => write!(f, "path '{path}'"),
            Self::Location(location) => write!(f, "location '{location}'"),
        }
    }
}

/// Login prompt visibility, driven by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPrompt {
    Shown,
    Hidden,
    /// Shown, flagged with a credentials error.
    InvalidCredentials,
}
