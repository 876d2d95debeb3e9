//! In-process revocation set
//!
//! Revoked tokens are keyed by their SHA-256 digest and kept only until the
//! token's own expiry; after that the signature check rejects them anyway.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

#[derive(Debug, Default)]
pub struct TokenBlacklist {
    entries: DashMap<String, DateTime<Utc>>,
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `token` as revoked until `expires_at`.
    pub fn add(&self, token: &str, expires_at: DateTime<Utc>) {
        self.entries.insert(token_digest(token), expires_at);
    }

    /// Expired entries found during the lookup are dropped on the spot.
    pub fn is_blacklisted_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let key = token_digest(token);
        let expired = match self.entries.get(&key) {
            None => return false,
            Some(expires_at) => *expires_at <= now,
        };

        if expired {
            self.entries.remove_if(&key, |_, expires_at| *expires_at <= now);
            return false;
        }
        true
    }

    /// Drop every entry whose token has expired. Returns the number removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Swept expired revocation entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
