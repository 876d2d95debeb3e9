//! Publish gatekeeping
//!
//! The media ingester calls `verify` when a broadcaster starts publishing and
//! `end` when the publish stops. A publish is allowed only for a well-formed
//! key that belongs to an active account.

use super::presence::PresenceCache;
use super::stream_key::validate_shape;
use crate::db::{SharedUserStore, StoreError};
use crate::metrics;
use crate::models::{
    DenyReason, OnlineStream, PublicStreamStatus, PublishDecision, StreamStatusView, UserPatch,
    UserRecord,
};
use jwt_security::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_ONLINE_LIMIT: usize = 50;
pub const MAX_ONLINE_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum GatekeeperError {
    #[error("user store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for GatekeeperError {
    fn from(err: StoreError) -> Self {
        GatekeeperError::StoreUnavailable(err.to_string())
    }
}

pub struct Gatekeeper {
    store: SharedUserStore,
    presence: Arc<PresenceCache>,
    clock: Arc<dyn Clock>,
    hls_base_url: String,
}

impl Gatekeeper {
    pub fn new(
        store: SharedUserStore,
        presence: Arc<PresenceCache>,
        clock: Arc<dyn Clock>,
        hls_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            presence,
            clock,
            hls_base_url: hls_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn watch_url(&self, username: &str) -> String {
        format!("{}/hls/{}/index.m3u8", self.hls_base_url, username)
    }

    /// Decide whether the claimed key may publish.
    pub async fn verify_publish(&self, claimed_key: &str) -> Result<PublishDecision, GatekeeperError> {
        let decision = self.decide(claimed_key).await;
        match &decision {
            Ok(decision) => metrics::record_publish_decision(decision.outcome()),
            Err(_) => metrics::record_publish_decision("store_unavailable"),
        }
        decision
    }

    async fn decide(&self, claimed_key: &str) -> Result<PublishDecision, GatekeeperError> {
        if !validate_shape(claimed_key) {
            warn!(key_len = claimed_key.len(), "Publish denied: malformed stream key");
            return Ok(PublishDecision::Deny(DenyReason::InvalidFormat));
        }

        let Some(user) = self.store.find_by_key(claimed_key).await? else {
            warn!("Publish denied: stream key not found");
            return Ok(PublishDecision::Deny(DenyReason::KeyNotFound));
        };

        if !user.is_active {
            warn!(user_id = %user.id, username = %user.username, "Publish denied: account disabled");
            return Ok(PublishDecision::Deny(DenyReason::AccountDisabled));
        }

        let patch = UserPatch::stream_started(self.clock.now());
        match self.store.update(user.id, patch).await {
            Ok(_) => {}
            // Deleted between lookup and write
            Err(StoreError::NotFound) => {
                return Ok(PublishDecision::Deny(DenyReason::KeyNotFound));
            }
            Err(err) => return Err(err.into()),
        }
        self.presence.record_live(&user.username);

        info!(user_id = %user.id, username = %user.username, "Publish allowed");
        Ok(PublishDecision::Allow {
            username: user.username,
        })
    }

    /// Record the end of a publish. Unknown keys and store failures are
    /// logged and otherwise ignored so the ingester never retries.
    pub async fn end_publish(&self, claimed_key: &str) {
        if !validate_shape(claimed_key) {
            warn!(key_len = claimed_key.len(), "Publish end for malformed stream key ignored");
            return;
        }

        let user = match self.store.find_by_key(claimed_key).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("Publish end for unknown stream key ignored");
                return;
            }
            Err(err) => {
                warn!(error = %err, "Publish end not recorded: store lookup failed");
                return;
            }
        };

        let patch = UserPatch::stream_ended(self.clock.now());
        if let Err(err) = self.store.update(user.id, patch).await {
            warn!(user_id = %user.id, error = %err, "Publish end not persisted");
        }
        self.presence.record_ended(&user.username);
        info!(user_id = %user.id, username = %user.username, "Publish ended");
    }

    /// Owner view, including the secret key.
    pub fn status(&self, user: &UserRecord) -> StreamStatusView {
        StreamStatusView {
            username: user.username.clone(),
            stream_key: user.stream_key.clone(),
            is_live: self.presence.is_live(&user.username),
            last_stream_time: user.last_stream_time,
            last_stream_end_time: user.last_stream_end_time,
            stream_count: user.stream_count,
            stream_key_updated_at: user.stream_key_updated_at,
            watch_url: self.watch_url(&user.username),
        }
    }

    pub async fn public_status(
        &self,
        username: &str,
    ) -> Result<Option<PublicStreamStatus>, GatekeeperError> {
        let Some(user) = self.store.find_by_username(username).await? else {
            return Ok(None);
        };

        Ok(Some(PublicStreamStatus {
            is_live: self.presence.is_live(&user.username),
            last_stream_time: user.last_stream_time,
            watch_url: self.watch_url(&user.username),
            username: user.username,
        }))
    }

    /// Live roster, most recent first. `limit` is clamped to 1..=100.
    pub fn list_online(&self, limit: Option<usize>) -> Vec<OnlineStream> {
        let limit = limit
            .unwrap_or(DEFAULT_ONLINE_LIMIT)
            .clamp(1, MAX_ONLINE_LIMIT);

        self.presence
            .live_entries()
            .into_iter()
            .take(limit)
            .map(|(username, live_since)| OnlineStream {
                watch_url: self.watch_url(&username),
                username,
                live_since,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryUserStore, UserStore};
    use crate::services::streaming::StreamKeyRegistry;
    use chrono::{Duration, Utc};
    use jwt_security::ManualClock;

    struct Fixture {
        store: Arc<InMemoryUserStore>,
        clock: ManualClock,
        registry: StreamKeyRegistry,
        gatekeeper: Gatekeeper,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryUserStore::new());
        let clock = ManualClock::new(Utc::now());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let presence = Arc::new(PresenceCache::new(Duration::seconds(60), shared_clock.clone()));
        let registry = StreamKeyRegistry::new(store.clone(), presence.clone(), shared_clock.clone());
        let gatekeeper = Gatekeeper::new(
            store.clone(),
            presence,
            shared_clock,
            "http://cdn.example.com/",
        );
        Fixture {
            store,
            clock,
            registry,
            gatekeeper,
        }
    }

    #[tokio::test]
    async fn test_verify_allows_active_user() {
        let f = fixture();
        let alice = f.registry.register_with_key("alice", "hash").await.unwrap();

        let decision = f.gatekeeper.verify_publish(&alice.stream_key).await.unwrap();

        assert_eq!(
            decision,
            PublishDecision::Allow {
                username: "alice".into()
            }
        );
        let stored = f.store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.stream_count, 1);
        assert!(stored.last_stream_time.is_some());
        assert!(f.gatekeeper.status(&stored).is_live);
    }

    #[tokio::test]
    async fn test_verify_deny_reasons() {
        let f = fixture();
        let alice = f.registry.register_with_key("alice", "hash").await.unwrap();

        assert_eq!(
            f.gatekeeper.verify_publish("bad<key>").await.unwrap(),
            PublishDecision::Deny(DenyReason::InvalidFormat)
        );
        assert_eq!(
            f.gatekeeper
                .verify_publish("nobody_000000_0123456789abcdef")
                .await
                .unwrap(),
            PublishDecision::Deny(DenyReason::KeyNotFound)
        );

        f.store
            .update(alice.id, UserPatch::set_active(false))
            .await
            .unwrap();
        assert_eq!(
            f.gatekeeper.verify_publish(&alice.stream_key).await.unwrap(),
            PublishDecision::Deny(DenyReason::AccountDisabled)
        );
        assert!(f.gatekeeper.list_online(None).is_empty());
    }

    #[tokio::test]
    async fn test_verify_store_outage() {
        let f = fixture();
        f.store.set_available(false);

        let err = f
            .gatekeeper
            .verify_publish("alice_000000_0123456789abcdef")
            .await
            .unwrap_err();
        assert!(matches!(err, GatekeeperError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_end_publish_is_idempotent() {
        let f = fixture();
        let alice = f.registry.register_with_key("alice", "hash").await.unwrap();
        f.gatekeeper.verify_publish(&alice.stream_key).await.unwrap();

        f.gatekeeper.end_publish(&alice.stream_key).await;
        f.gatekeeper.end_publish(&alice.stream_key).await;
        f.gatekeeper.end_publish("unknown_key_0123456789").await;
        f.gatekeeper.end_publish("{}").await;

        let stored = f.store.find_by_id(alice.id).await.unwrap().unwrap();
        assert!(stored.last_stream_end_time.is_some());
        assert!(!f.gatekeeper.status(&stored).is_live);
    }

    #[tokio::test]
    async fn test_public_status_and_watch_url() {
        let f = fixture();
        let alice = f.registry.register_with_key("alice", "hash").await.unwrap();
        f.gatekeeper.verify_publish(&alice.stream_key).await.unwrap();

        let status = f.gatekeeper.public_status("ALICE").await.unwrap().unwrap();
        assert!(status.is_live);
        assert_eq!(status.username, "alice");
        assert_eq!(
            status.watch_url,
            "http://cdn.example.com/hls/alice/index.m3u8"
        );

        assert!(f.gatekeeper.public_status("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_live_status_lapses_without_end() {
        let f = fixture();
        let alice = f.registry.register_with_key("alice", "hash").await.unwrap();
        f.gatekeeper.verify_publish(&alice.stream_key).await.unwrap();

        f.clock.advance(Duration::seconds(61));

        let status = f.gatekeeper.public_status("alice").await.unwrap().unwrap();
        assert!(!status.is_live);
    }

    #[tokio::test]
    async fn test_list_online_order_and_limit() {
        let f = fixture();
        for name in ["alice", "bob", "carol"] {
            let user = f.registry.register_with_key(name, "hash").await.unwrap();
            f.gatekeeper.verify_publish(&user.stream_key).await.unwrap();
            f.clock.advance(Duration::seconds(1));
        }

        let names: Vec<_> = f
            .gatekeeper
            .list_online(Some(2))
            .into_iter()
            .map(|s| s.username)
            .collect();
        assert_eq!(names, vec!["carol", "bob"]);

        assert_eq!(f.gatekeeper.list_online(Some(0)).len(), 1);
        assert_eq!(f.gatekeeper.list_online(Some(1000)).len(), 3);
    }
}
