use super::user_store::{StoreError, StoreResult, UserStore};
use crate::models::{UserPatch, UserRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    by_key: HashMap<String, Uuid>,
    /// Lowercased username
    by_username: HashMap<String, Uuid>,
}

/// Process-local user store
pub struct InMemoryUserStore {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Unavailable` while false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store offline".into()))
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_key(&self, stream_key: &str) -> StoreResult<Option<UserRecord>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .by_key
            .get(stream_key)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        self.ensure_available()?;
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        self.ensure_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .by_username
            .get(&username.to_lowercase())
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn insert(&self, record: UserRecord) -> StoreResult<UserRecord> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;

        let username_key = record.username.to_lowercase();
        if tables.by_username.contains_key(&username_key) {
            return Err(StoreError::DuplicateUsername);
        }
        if tables.by_key.contains_key(&record.stream_key) {
            return Err(StoreError::DuplicateStreamKey);
        }

        tables.by_username.insert(username_key, record.id);
        tables.by_key.insert(record.stream_key.clone(), record.id);
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> StoreResult<UserRecord> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;

        let old_key = match tables.users.get(&id) {
            Some(user) => user.stream_key.clone(),
            None => return Err(StoreError::NotFound),
        };

        if let Some(new_key) = &patch.stream_key {
            if *new_key != old_key && tables.by_key.contains_key(new_key) {
                return Err(StoreError::DuplicateStreamKey);
            }
        }

        let updated = {
            let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
            patch.apply(user);
            user.clone()
        };

        if updated.stream_key != old_key {
            tables.by_key.remove(&old_key);
            tables.by_key.insert(updated.stream_key.clone(), id);
        }

        Ok(updated)
    }
}
