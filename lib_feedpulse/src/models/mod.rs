//! # Models
//!
//! Wire and domain types shared by the push pipeline and the session pipeline.
//! Field names follow the server's JSON so records round-trip through storage
//! and the session API unchanged.

/// Bearer credential newtype.
pub mod credential;
/// Push-channel payloads and the decoded `DomainEvent`.
pub mod events;
/// Route intents, route-change notifications and navigation targets.
pub mod route;
/// Session state as seen by consumers.
pub mod session;
/// Cached and validated user records.
pub mod user;

pub use credential::Credential;
pub use events::{
    ArticleStateEvent, DomainEvent, FeedUpdateEvent, QueryOptions, ARTICLE_STATE_EVENT,
    FEED_UPDATE_EVENT,
};
pub use route::{LoginPrompt, NavigationTarget, RouteChange, RouteIntent, RouteParams};
pub use session::SessionState;
pub use user::{ProfileData, UserRecord, ValidationResponse};
