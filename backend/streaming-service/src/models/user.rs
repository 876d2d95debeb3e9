use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User record as held by the user store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    /// Unique, compared case-insensitively
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Unique, always passes stream key shape validation
    pub stream_key: String,
    pub is_active: bool,
    pub last_stream_time: Option<DateTime<Utc>>,
    pub last_stream_end_time: Option<DateTime<Utc>>,
    pub stream_count: u64,
    pub stream_key_updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        stream_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            stream_key: stream_key.into(),
            is_active: true,
            last_stream_time: None,
            last_stream_end_time: None,
            stream_count: 0,
            stream_key_updated_at: now,
            created_at: now,
        }
    }
}

/// Partial update applied atomically by the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub stream_key: Option<String>,
    pub stream_key_updated_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub last_stream_time: Option<DateTime<Utc>>,
    pub last_stream_end_time: Option<DateTime<Utc>>,
    pub increment_stream_count: bool,
}

impl UserPatch {
    pub fn stream_started(at: DateTime<Utc>) -> Self {
        Self {
            last_stream_time: Some(at),
            increment_stream_count: true,
            ..Self::default()
        }
    }

    pub fn stream_ended(at: DateTime<Utc>) -> Self {
        Self {
            last_stream_end_time: Some(at),
            ..Self::default()
        }
    }

    pub fn new_stream_key(key: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            stream_key: Some(key.into()),
            stream_key_updated_at: Some(at),
            ..Self::default()
        }
    }

    pub fn set_active(active: bool) -> Self {
        Self {
            is_active: Some(active),
            ..Self::default()
        }
    }

    pub fn apply(&self, record: &mut UserRecord) {
        if let Some(key) = &self.stream_key {
            record.stream_key = key.clone();
        }
        if let Some(at) = self.stream_key_updated_at {
            record.stream_key_updated_at = at;
        }
        if let Some(active) = self.is_active {
            record.is_active = active;
        }
        if let Some(at) = self.last_stream_time {
            record.last_stream_time = Some(at);
        }
        if let Some(at) = self.last_stream_end_time {
            record.last_stream_end_time = Some(at);
        }
        if self.increment_stream_count {
            record.stream_count += 1;
        }
    }
}

/// Account view without secrets
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub is_active: bool,
    pub stream_count: u64,
    pub last_stream_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_active: user.is_active,
            stream_count: user.stream_count,
            last_stream_time: user.last_stream_time,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_started_patch_increments_count() {
        let now = Utc::now();
        let mut user = UserRecord::new("alice", "hash", "alice_key_0123456789", now);

        UserPatch::stream_started(now).apply(&mut user);
        UserPatch::stream_started(now).apply(&mut user);

        assert_eq!(user.stream_count, 2);
        assert_eq!(user.last_stream_time, Some(now));
        assert_eq!(user.last_stream_end_time, None);
    }

    #[test]
    fn test_new_stream_key_patch_touches_only_key_fields() {
        let created = Utc::now();
        let later = created + chrono::Duration::minutes(5);
        let mut user = UserRecord::new("alice", "hash", "alice_key_0123456789", created);

        UserPatch::new_stream_key("alice_key_abcdef0123", later).apply(&mut user);

        assert_eq!(user.stream_key, "alice_key_abcdef0123");
        assert_eq!(user.stream_key_updated_at, later);
        assert_eq!(user.created_at, created);
        assert_eq!(user.stream_count, 0);
    }
}
