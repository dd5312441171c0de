//! # User Records
//!
//! The record cached in persistent storage and promoted to "current user" once
//! the server confirms it. Identity fields keep the server's PascalCase names;
//! `authTime` and `capabilities` are attached by the client after validation.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// # User Record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "Login", default)]
    pub login: String,
    #[serde(rename = "FirstName", default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(rename = "LastName", default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(rename = "Email", default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(rename = "Admin", default)]
    pub admin: bool,
    #[serde(rename = "Active", default)]
    pub active: bool,
    #[serde(rename = "ProfileData", default, skip_serializing_if = "Option::is_none")]
    pub profile_data: Option<ProfileData>,
    /// When the server last confirmed this record. Serialized as epoch
    /// milliseconds.
    #[serde(
        rename = "authTime",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub capabilities: BTreeSet<String>,
}

impl UserRecord {
    /// A record is stale when it was never confirmed or was confirmed more than
    /// `ttl` before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        match self.auth_time {
            Some(auth_time) => now - auth_time > ttl,
            None => true,
        }
    }

    pub fn profile(&self) -> Option<&ProfileData> {
        self.profile_data.as_ref()
    }
}

/// # Profile Data
///
/// User preferences the client acts on after login. Keys this client does not
/// interpret are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_services: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a validation response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    #[serde(rename = "Auth", default)]
    pub auth: bool,
    #[serde(rename = "User", default)]
    pub user: Option<UserRecord>,
    #[serde(rename = "Capabilities", default)]
    pub capabilities: BTreeSet<String>,
}

impl ValidationResponse {
    /// The server refused the candidate.
    pub fn rejected() -> Self {
        Self::default()
    }

    pub fn accepted(user: UserRecord, capabilities: impl IntoIterator<Item = String>) -> Self {
        Self {
            auth: true,
            user: Some(user),
            capabilities: capabilities.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trips_through_storage_json() {
        let mut user = UserRecord {
            login: "jdoe".into(),
            active: true,
            auth_time: Some(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()),
            ..Default::default()
        };
        user.capabilities.insert("search".into());
        user.profile_data = Some(ProfileData {
            language: Some("de".into()),
            ..Default::default()
        });

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["Login"], "jdoe");
        assert_eq!(json["authTime"], 1_700_000_000_123_i64);
        assert_eq!(json["ProfileData"]["language"], "de");

        let back: UserRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn unknown_profile_keys_survive() {
        let user: UserRecord = serde_json::from_str(
            r#"{"Login": "a", "ProfileData": {"theme": "blue", "unreadFirst": true}}"#,
        )
        .unwrap();
        let profile = user.profile().unwrap();
        assert_eq!(profile.theme.as_deref(), Some("blue"));
        assert_eq!(profile.extra.get("unreadFirst"), Some(&Value::Bool(true)));
    }

    #[test]
    fn expiry_is_measured_from_auth_time() {
        let now = Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap();
        let ttl = TimeDelta::days(15);
        let mut user = UserRecord::default();
        assert!(user.is_expired(now, ttl), "never confirmed");

        user.auth_time = Some(now - TimeDelta::days(14));
        assert!(!user.is_expired(now, ttl));

        user.auth_time = Some(now - TimeDelta::days(15) - TimeDelta::seconds(1));
        assert!(user.is_expired(now, ttl));
    }

    #[test]
    fn validation_response_defaults_to_rejected() {
        let response: ValidationResponse = serde_json::from_str(r#"{"Auth": false}"#).unwrap();
        assert_eq!(response, ValidationResponse::rejected());
    }
}
