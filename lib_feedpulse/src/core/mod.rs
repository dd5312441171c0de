//! # Core Module
//!
//! The coordination logic of the client. Nothing here performs I/O directly;
//! every effect goes through a port.
//!
//! ## Push pipeline:
//!
//! - **`connection`**: `ConnectionHandle`, one live push connection with
//!   per-event-name listeners that stop the moment the handle is closed.
//! - **`stream_manager`**: turns the credential sequence into a replay-last
//!   sequence of handles, closing each before the next is opened.
//! - **`event_router`**: typed, independently subscribable streams of
//!   feed updates and article state changes that follow the current handle.
//!
//! ## Session pipeline:
//!
//! - **`session_validator`**: the `Unauthenticated -> Validating -> Trusted`
//!   state machine around the validation round trip.
//! - **`navigation_guard`**: route corrections driven by the session state.
//! - **`post_login`**: locale redirect, theme and share services.
//! - **`session_context`**: wiring plus the event loop.
//! - **`debounce`**, **`return_url`**, **`settings`**: supporting pieces.

pub mod connection;
pub mod debounce;
pub mod event_router;
pub mod navigation_guard;
pub mod post_login;
pub mod return_url;
pub mod session_context;
pub mod session_validator;
pub mod settings;
pub mod stream_manager;

// --- Public API Re-exports ---
pub use connection::{ConnectionHandle, RawEvent};
pub use debounce::Debouncer;
pub use event_router::{EventRouter, EventStream};
pub use navigation_guard::{GuardDecision, NavigationGuard};
pub use post_login::{LocaleRedirect, ShareServiceActivator, ThemeApplier};
pub use return_url::{decode_return_url, encode_return_url};
pub use session_context::{SessionContext, SessionPorts};
pub use session_validator::{SessionEvent, SessionListener, SessionValidator, Subscription, ValidationOutcome};
pub use settings::{RouteTable, SessionSettings, StreamSettings};
pub use stream_manager::{handle_stream, HandleStream, StreamManager};
