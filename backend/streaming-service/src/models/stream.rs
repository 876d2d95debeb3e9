use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a publish attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InvalidFormat,
    KeyNotFound,
    AccountDisabled,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::InvalidFormat => "invalid_format",
            DenyReason::KeyNotFound => "key_not_found",
            DenyReason::AccountDisabled => "account_disabled",
        }
    }
}

/// Answer given to the media ingester for a publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishDecision {
    Allow { username: String },
    Deny(DenyReason),
}

impl PublishDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PublishDecision::Allow { .. })
    }

    /// Label used for the publish decision counter
    pub fn outcome(&self) -> &'static str {
        match self {
            PublishDecision::Allow { .. } => "allowed",
            PublishDecision::Deny(reason) => reason.as_str(),
        }
    }
}

/// Stream status as seen by the account owner
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatusView {
    pub username: String,
    pub stream_key: String,
    pub is_live: bool,
    pub last_stream_time: Option<DateTime<Utc>>,
    pub last_stream_end_time: Option<DateTime<Utc>>,
    pub stream_count: u64,
    pub stream_key_updated_at: DateTime<Utc>,
    pub watch_url: String,
}

/// Stream status visible to anyone; never carries the stream key
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStreamStatus {
    pub username: String,
    pub is_live: bool,
    pub last_stream_time: Option<DateTime<Utc>>,
    pub watch_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStream {
    pub username: String,
    pub live_since: DateTime<Utc>,
    pub watch_url: String,
}
