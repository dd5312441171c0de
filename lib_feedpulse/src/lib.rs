//! # lib_feedpulse
//!
//! Client-side core of the feedpulse reader: a live server-push channel keyed
//! to the current credential, and the session-validation state machine that
//! gates navigation behind a server round trip.
//!
//! ## Layout:
//!
//! - **`models`**: wire and domain types (events, user records, routes).
//! - **`ports`**: traits at the seams to the outside world (transport, session
//!   API, storage, router, presentation).
//! - **`core`**: the coordination logic. `StreamManager` and `EventRouter` form
//!   the push pipeline; `SessionValidator`, `NavigationGuard` and
//!   `SessionContext` form the session pipeline.
//! - **`ingestors`** / **`retrieve`** (feature `transport`): reqwest-backed
//!   implementations of the transport and session API ports.
//! - **`storage`**: in-memory and file-backed user stores.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod core;
pub mod error;
pub mod models;
pub mod ports;
pub mod storage;

#[cfg(feature = "transport")]
pub mod ingestors;
#[cfg(feature = "transport")]
pub mod retrieve;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// --- Public API Re-exports ---
pub use crate::core::{
    ConnectionHandle, Debouncer, EventRouter, EventStream, GuardDecision, NavigationGuard,
    RawEvent, RouteTable, SessionContext, SessionEvent, SessionListener, SessionPorts,
    SessionSettings, SessionValidator, StreamManager, StreamSettings, Subscription,
    ValidationOutcome,
};
pub use crate::error::{NavigationError, SessionError, StorageError, StreamError};
pub use crate::models::*;
