//! # Push Events
//!
//! Payload shapes of the two named channels on the push connection, and the
//! tagged `DomainEvent` they decode into.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Channel name carrying `FeedUpdateEvent` payloads.
pub const FEED_UPDATE_EVENT: &str = "feed-update";
/// Channel name carrying `ArticleStateEvent` payloads.
pub const ARTICLE_STATE_EVENT: &str = "article-state-change";

/// New articles arrived for a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedUpdateEvent {
    #[serde(rename = "feedID")]
    pub feed_id: i64,
    /// In server order.
    #[serde(rename = "articleIDs", default)]
    pub article_ids: Vec<i64>,
}

/// A bulk article state change (read, favorite, ...) matching `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleStateEvent {
    pub state: String,
    pub value: bool,
    #[serde(default)]
    pub options: QueryOptions,
}

/// # Query Options
///
/// Sparse article filter. Every field is optional and an absent field places no
/// constraint on that axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<i64>>,
    #[serde(rename = "feedIDs", default, skip_serializing_if = "Option::is_none")]
    pub feed_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untagged_only: Option<bool>,
    #[serde(rename = "beforeID", default, skip_serializing_if = "Option::is_none")]
    pub before_id: Option<i64>,
    #[serde(rename = "afterID", default, skip_serializing_if = "Option::is_none")]
    pub after_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_date: Option<DateTime<Utc>>,
}

impl QueryOptions {
    /// True when no axis is constrained.
    pub fn is_unconstrained(&self) -> bool {
        self == &Self::default()
    }
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    FeedUpdate(FeedUpdateEvent),
    ArticleState(ArticleStateEvent),
}

impl DomainEvent {
    /// Decodes `payload` according to the channel it arrived on. Returns `None`
    /// for channels this client does not know.
    pub fn decode(event: &str, payload: &str) -> Option<Result<Self, StreamError>> {
        match event {
            FEED_UPDATE_EVENT => Some(decode_payload(event, payload).map(Self::FeedUpdate)),
            ARTICLE_STATE_EVENT => Some(decode_payload(event, payload).map(Self::ArticleState)),
            _ => None,
        }
    }

    /// The channel name this event travels on.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::FeedUpdate(_) => FEED_UPDATE_EVENT,
            Self::ArticleState(_) => ARTICLE_STATE_EVENT,
        }
    }
}

/// Parses one JSON payload received on `event`.
pub fn decode_payload<T: DeserializeOwned>(event: &str, payload: &str) -> Result<T, StreamError> {
    serde_json::from_str(payload).map_err(|source| StreamError::Decode {
        event: event.to_string(),
        source,
    })
}
