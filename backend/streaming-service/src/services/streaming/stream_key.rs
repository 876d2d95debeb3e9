//! Stream key generation and uniqueness
//!
//! Keys look like `{username}_{base36 millis}_{16 hex}`. The store's
//! uniqueness constraint is the source of truth: a pre-check avoids obvious
//! collisions, and a clash at write time retries the whole generate-and-write
//! unit.

use super::presence::PresenceCache;
use crate::db::{SharedUserStore, StoreError};
use crate::models::{UserPatch, UserRecord};
use jwt_security::Clock;
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const MIN_KEY_LENGTH: usize = 10;
pub const MAX_KEY_LENGTH: usize = 100;
pub const MAX_GENERATION_ATTEMPTS: usize = 5;
const RANDOM_SUFFIX_BYTES: usize = 8;
const FORBIDDEN_CHARS: [char; 7] = ['<', '>', '{', '}', '[', ']', '\\'];

#[derive(Debug, Error)]
pub enum StreamKeyError {
    #[error("invalid stream key format")]
    InvalidFormat,

    #[error("failed to generate a unique stream key after {attempts} attempts")]
    KeyGenerationFailed { attempts: usize },

    #[error("stream is live; end it before rotating the key")]
    StreamInProgress,

    #[error("username already exists")]
    UserExists,

    #[error("user not found")]
    UserNotFound,

    #[error("user store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for StreamKeyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => StreamKeyError::UserExists,
            StoreError::NotFound => StreamKeyError::UserNotFound,
            StoreError::Unavailable(msg) => StreamKeyError::StoreUnavailable(msg),
            // Only reachable once retries are exhausted
            StoreError::DuplicateStreamKey => StreamKeyError::KeyGenerationFailed {
                attempts: MAX_GENERATION_ATTEMPTS,
            },
        }
    }
}

/// Cheap, synchronous shape check run before any store lookup.
pub fn validate_shape(candidate: &str) -> bool {
    (MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&candidate.len())
        && !candidate.contains(&FORBIDDEN_CHARS[..])
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

pub struct StreamKeyRegistry {
    store: SharedUserStore,
    presence: Arc<PresenceCache>,
    clock: Arc<dyn Clock>,
}

impl StreamKeyRegistry {
    pub fn new(store: SharedUserStore, presence: Arc<PresenceCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            presence,
            clock,
        }
    }

    fn candidate(&self, username: &str) -> String {
        let millis = self.clock.now().timestamp_millis().max(0) as u64;
        let mut suffix = [0u8; RANDOM_SUFFIX_BYTES];
        rand::thread_rng().fill_bytes(&mut suffix);
        format!("{}_{}_{}", username, to_base36(millis), hex::encode(suffix))
    }

    /// A fresh key not currently present in the store.
    pub async fn generate(&self, username: &str) -> Result<String, StreamKeyError> {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let candidate = self.candidate(username);
            if !validate_shape(&candidate) {
                // Usernames are validated upstream; only a hostile caller lands here
                return Err(StreamKeyError::InvalidFormat);
            }
            if self.store.find_by_key(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            warn!(%username, attempt, "Generated stream key collided, retrying");
        }

        Err(StreamKeyError::KeyGenerationFailed {
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }

    /// Insert a new user with a freshly generated key.
    pub async fn register_with_key(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, StreamKeyError> {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let key = self.generate(username).await?;
            let record = UserRecord::new(username, password_hash, key, self.clock.now());
            match self.store.insert(record).await {
                Ok(user) => {
                    info!(user_id = %user.id, %username, "User registered with stream key");
                    return Ok(user);
                }
                Err(StoreError::DuplicateStreamKey) => {
                    warn!(%username, attempt, "Stream key taken at insert, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StreamKeyError::KeyGenerationFailed {
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }

    /// Replace `user`'s key with a fresh one.
    pub async fn assign_new_key(&self, user: &UserRecord) -> Result<UserRecord, StreamKeyError> {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let key = self.generate(&user.username).await?;
            let patch = UserPatch::new_stream_key(key, self.clock.now());
            match self.store.update(user.id, patch).await {
                Ok(updated) => {
                    info!(user_id = %user.id, username = %user.username, "Stream key assigned");
                    return Ok(updated);
                }
                Err(StoreError::DuplicateStreamKey) => {
                    warn!(user_id = %user.id, attempt, "Stream key taken at update, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StreamKeyError::KeyGenerationFailed {
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }

    /// Like [`assign_new_key`](Self::assign_new_key), refused while the user is live.
    pub async fn rotate(&self, user: &UserRecord) -> Result<UserRecord, StreamKeyError> {
        if self.presence.is_live(&user.username) {
            return Err(StreamKeyError::StreamInProgress);
        }
        self.assign_new_key(user).await
    }
}
