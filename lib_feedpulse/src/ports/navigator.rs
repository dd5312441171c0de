use crate::error::NavigationError;
use crate::models::{LoginPrompt, NavigationTarget};

/// # Navigator
///
/// The external router as seen by the navigation guard. Reads are against the
/// live routing state at call time.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, target: NavigationTarget) -> Result<(), NavigationError>;

    /// Whether the named route is part of the active route chain.
    fn is_active(&self, route: &str) -> bool;

    /// A parameter of an active route.
    fn route_param(&self, route: &str, name: &str) -> Option<String>;

    /// The current application path, e.g. `/feed/all`. Empty before the first
    /// navigation.
    fn current_path(&self) -> String;

    fn set_login_prompt(&self, prompt: LoginPrompt);
}
