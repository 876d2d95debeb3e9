//! Short-TTL presence cache
//!
//! Answers "is this user live" without a store round trip. Entries are
//! written when a publish is allowed or ended and go stale after the stream
//! timeout, so a crashed ingester that never sends `end` stops reporting the
//! user as live on its own.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use jwt_security::Clock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default stream timeout and presence TTL
pub const DEFAULT_STREAM_TIMEOUT_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub recorded_at: DateTime<Utc>,
}

/// Key/value map whose entries expire `ttl` after they were written
pub struct TtlCache<V> {
    ttl: Duration,
    entries: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let recorded_at = self.clock.now();
        self.entries
            .insert(key.into(), CacheEntry { value, recorded_at });
    }

    /// Fresh entry for `key`, if any. Stale entries are dropped on lookup.
    pub fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?.clone();
        if self.is_stale(&entry, now) {
            self.entries
                .remove_if(key, |_, current| self.is_stale(current, now));
            return None;
        }
        Some(entry)
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Fresh entries at the time of the call
    pub fn snapshot(&self) -> Vec<(String, CacheEntry<V>)> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|item| !self.is_stale(item.value(), now))
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }

    /// Drop every stale entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_stale(entry, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_stale(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now - entry.recorded_at >= self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Live,
    Ended,
}

pub type PresenceEntry = CacheEntry<PresenceState>;

/// Live/ended markers per username
pub struct PresenceCache {
    cache: TtlCache<PresenceState>,
}

impl PresenceCache {
    pub fn new(stream_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: TtlCache::new(stream_timeout, clock),
        }
    }

    pub fn stream_timeout(&self) -> Duration {
        self.cache.ttl()
    }

    pub fn record_live(&self, username: &str) {
        self.cache.insert(username, PresenceState::Live);
        debug!(%username, "Presence recorded live");
    }

    pub fn record_ended(&self, username: &str) {
        self.cache.insert(username, PresenceState::Ended);
        debug!(%username, "Presence recorded ended");
    }

    pub fn get(&self, username: &str) -> Option<PresenceEntry> {
        self.cache.get(username)
    }

    pub fn is_live(&self, username: &str) -> bool {
        let Some(entry) = self.cache.get(username) else {
            return false;
        };
        if entry.value != PresenceState::Live {
            return false;
        }

        let now = self.cache.now();
        if entry.recorded_at > now {
            warn!(
                %username,
                recorded_at = %entry.recorded_at,
                %now,
                "Presence entry recorded in the future; treating as offline"
            );
            return false;
        }
        true
    }

    /// Users currently live with the time they went live, most recent first
    pub fn live_entries(&self) -> Vec<(String, DateTime<Utc>)> {
        let now = self.cache.now();
        let mut live: Vec<_> = self
            .cache
            .snapshot()
            .into_iter()
            .filter(|(_, entry)| entry.value == PresenceState::Live && entry.recorded_at <= now)
            .map(|(username, entry)| (username, entry.recorded_at))
            .collect();
        live.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        live
    }

    pub fn sweep(&self) -> usize {
        let removed = self.cache.sweep();
        if removed > 0 {
            debug!(removed, "Swept stale presence entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
