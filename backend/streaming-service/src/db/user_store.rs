use crate::models::{UserPatch, UserRecord};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("stream key already in use")]
    DuplicateStreamKey,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("user not found")]
    NotFound,

    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// User store interface
///
/// Implementations enforce uniqueness of `stream_key` and of `username`
/// (case-insensitive) atomically with the write.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_key(&self, stream_key: &str) -> StoreResult<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>>;

    /// Fails with `DuplicateUsername` or `DuplicateStreamKey` on a uniqueness clash
    async fn insert(&self, record: UserRecord) -> StoreResult<UserRecord>;

    /// Apply `patch` and return the updated record
    async fn update(&self, id: Uuid, patch: UserPatch) -> StoreResult<UserRecord>;
}

pub type SharedUserStore = Arc<dyn UserStore>;
