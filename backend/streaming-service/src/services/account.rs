//! Account flows: register, login, refresh, profile, logout

use crate::db::SharedUserStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::UserRecord;
use crate::security::{hash_password, verify_password, verify_password_unknown_user};
use crate::services::streaming::StreamKeyRegistry;
use crate::validators::{validate_password, validate_username, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};
use jwt_security::{IssuedToken, TokenError, TokenService};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserRecord,
    pub token: IssuedToken,
}

pub struct AccountService {
    store: SharedUserStore,
    registry: Arc<StreamKeyRegistry>,
    tokens: Arc<TokenService>,
}

impl AccountService {
    pub fn new(
        store: SharedUserStore,
        registry: Arc<StreamKeyRegistry>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            store,
            registry,
            tokens,
        }
    }

    /// Create the account and its first stream key.
    pub async fn register(&self, username: &str, password: &str) -> Result<UserRecord> {
        let username = username.trim();
        if !validate_username(username) {
            return Err(AppError::Validation(
                "username must be 3-30 characters of letters, digits, '_' or '-'".to_string(),
            ));
        }
        if !validate_password(password) {
            return Err(AppError::Validation(format!(
                "password must be {MIN_PASSWORD_LENGTH}-{MAX_PASSWORD_LENGTH} characters"
            )));
        }

        if self.store.find_by_username(username).await?.is_some() {
            return Err(AppError::UserExists);
        }

        let password_hash = hash_password(password)?;
        let user = self
            .registry
            .register_with_key(username, &password_hash)
            .await?;

        info!(user_id = %user.id, username = %user.username, "Account registered");
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "username and password are required".to_string(),
            ));
        }

        let Some(user) = self.store.find_by_username(username).await? else {
            warn!(%username, "Login failed: unknown user");
            return Err(verify_password_unknown_user(password));
        };

        if let Err(err) = verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "Login failed: bad password");
            return Err(err);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "Login refused: account disabled");
            return Err(AppError::AccountDisabled);
        }

        let token = self
            .tokens
            .issue(user.id, &user.username, &user.stream_key)?;
        metrics::record_token_issued();

        info!(user_id = %user.id, username = %user.username, "Login succeeded");
        Ok(LoginOutcome { user, token })
    }

    /// Swap the presented token for a new one carrying the current stream key.
    pub async fn refresh(&self, user_id: Uuid, presented_token: &str) -> Result<IssuedToken> {
        // A token for a user that no longer exists is simply invalid
        let user = match self.active_user(user_id).await {
            Err(AppError::UserNotFound) => {
                return Err(AppError::Token(TokenError::InvalidPayload))
            }
            other => other?,
        };

        let token = self
            .tokens
            .issue(user.id, &user.username, &user.stream_key)?;
        metrics::record_token_issued();
        self.revoke_quietly(presented_token);

        info!(user_id = %user.id, "Session token refreshed");
        Ok(token)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserRecord> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Best effort; never fails.
    pub fn logout(&self, user_id: Uuid, presented_token: &str) {
        self.revoke_quietly(presented_token);
        info!(%user_id, "Logged out");
    }

    /// Rotate the caller's stream key. Refused while the stream is live.
    pub async fn regenerate_stream_key(&self, user_id: Uuid) -> Result<UserRecord> {
        let user = self.active_user(user_id).await?;
        let updated = self.registry.rotate(&user).await?;
        info!(user_id = %user.id, "Stream key regenerated");
        Ok(updated)
    }

    async fn active_user(&self, user_id: Uuid) -> Result<UserRecord> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        if !user.is_active {
            return Err(AppError::AccountDisabled);
        }
        Ok(user)
    }

    fn revoke_quietly(&self, token: &str) {
        match self.tokens.revoke(token) {
            Ok(true) => metrics::record_token_revoked(),
            Ok(false) => {}
            Err(err) => warn!(error = %err, "Token revocation skipped"),
        }
    }
}
