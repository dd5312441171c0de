//! # Ports
//!
//! Traits at the seams between the coordination core and the outside world.
//! The core only ever talks to these; concrete implementations live in
//! `ingestors`, `retrieve` and `storage`, and fakes in `test_support`.
//!
//! ## Contained Ports:
//! - **`Connector`**: opens one physical push connection for a credential.
//! - **`SessionApi`**: the validation round trip and the logout notification.
//! - **`UserStore`**: the single persistent user slot and its change feed.
//! - **`Navigator`**: the external router (read active routes, issue corrections).
//! - **`Presentation`**: the UI-side effects applied after login.

pub mod navigator;
pub mod presentation;
pub mod session_api;
pub mod transport;
pub mod user_store;

pub use navigator::Navigator;
pub use presentation::Presentation;
pub use session_api::SessionApi;
pub use transport::Connector;
pub use user_store::{StorageChange, UserStore};
