//! JWT session tokens for the stream gatekeeper
//!
//! **Security Features**:
//! - HS256 signing with secret strength validation at startup
//! - Issuer/audience binding
//! - JWT ID (jti) on every token
//! - In-process revocation set bounded by token expiry
//! - "Expires soon" advisory for clients that should refresh
//!
//! Time checks run against an injected [`Clock`] rather than inside
//! `jsonwebtoken`, so expiry is exact (no leeway) and testable.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod clock;
pub mod error;
pub mod secret_validation;
pub mod token_blacklist;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{TokenError, TokenResult};
pub use secret_validation::{assess_secret, validate_secret_strength, SecretStrength};
pub use token_blacklist::TokenBlacklist;

const NBF_LEEWAY_SECS: i64 = 30;
const MAX_IAT_FUTURE_SKEW_SECS: i64 = 300;
const DEFAULT_EXPIRES_IN_HOURS: i64 = 24;
const EXPIRES_SOON_THRESHOLD_SECS: i64 = 3600;

/// Signed claims carried by every session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub username: String,
    /// Stream key at issue time
    #[serde(default)]
    pub stream_key: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub iss: String,
    pub aud: String,
    pub jti: String,
}

/// Claims handed back to the route layer after a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub subject_id: Uuid,
    pub username: String,
    pub stream_key: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
    /// Remaining lifetime is under one hour
    pub expires_soon: bool,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_in: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "stream-gatekeeper".to_string(),
            audience: "stream-gatekeeper-clients".to_string(),
            expires_in: Duration::hours(DEFAULT_EXPIRES_IN_HOURS),
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Issues, verifies and revokes session tokens
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    config: TokenConfig,
    blacklist: TokenBlacklist,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Fails with [`TokenError::Config`] when the secret is missing. Short or
    /// low-entropy secrets are logged and accepted.
    pub fn new(config: TokenConfig, clock: Arc<dyn Clock>) -> TokenResult<Self> {
        if config.secret.trim().is_empty() {
            return Err(TokenError::Config(
                "JWT signing secret is not set".to_string(),
            ));
        }
        if config.expires_in < Duration::zero() {
            return Err(TokenError::Config(
                "JWT lifetime must not be negative".to_string(),
            ));
        }

        let assessment = assess_secret(&config.secret);
        if assessment.length < secret_validation::MIN_SECRET_LENGTH {
            warn!(
                length = assessment.length,
                minimum = secret_validation::MIN_SECRET_LENGTH,
                "JWT secret is shorter than recommended"
            );
        } else if assessment.strength == SecretStrength::Weak {
            warn!(
                entropy = assessment.entropy,
                "JWT secret has low entropy or an obvious pattern"
            );
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        // exp/nbf are checked against our own clock
        validation.validate_exp = false;
        validation.validate_nbf = false;

        info!(
            issuer = %config.issuer,
            audience = %config.audience,
            expires_in_secs = config.expires_in.num_seconds(),
            "Token service initialized with HS256"
        );

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
            blacklist: TokenBlacklist::new(),
            clock,
        })
    }

    pub fn with_system_clock(config: TokenConfig) -> TokenResult<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn default_expires_in(&self) -> Duration {
        self.config.expires_in
    }

    /// Issue a token with the configured lifetime
    pub fn issue(
        &self,
        subject_id: Uuid,
        username: &str,
        stream_key: &str,
    ) -> TokenResult<IssuedToken> {
        self.issue_with_expiry(subject_id, username, stream_key, self.config.expires_in)
    }

    pub fn issue_with_expiry(
        &self,
        subject_id: Uuid,
        username: &str,
        stream_key: &str,
        expires_in: Duration,
    ) -> TokenResult<IssuedToken> {
        let now = self.clock.now();
        let expires_at = now.checked_add_signed(expires_in).ok_or_else(|| {
            TokenError::Config(format!(
                "token lifetime of {}s overflows the clock",
                expires_in.num_seconds()
            ))
        })?;

        let claims = Claims {
            sub: subject_id.to_string(),
            username: username.to_string(),
            stream_key: stream_key.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: Some(now.timestamp()),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        debug!(user_id = %subject_id, %username, "Issued session token");
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token value taken from any accepted carrier
    pub fn verify(&self, token: &str) -> TokenResult<VerifiedToken> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::NoToken);
        }

        let now = self.clock.now();
        if self.blacklist.is_blacklisted_at(token, now) {
            return Err(TokenError::Revoked);
        }

        let claims = self.decode_signed(token)?;
        let session = session_claims(&claims)?;
        let now_secs = now.timestamp();

        if now_secs >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.nbf.is_some_and(|nbf| nbf > now_secs + NBF_LEEWAY_SECS)
            || claims.iat > now_secs + MAX_IAT_FUTURE_SKEW_SECS
        {
            return Err(TokenError::NotYetValid);
        }

        let expires_at = timestamp_to_datetime(claims.exp)?;
        let expires_soon = claims.exp - now_secs < EXPIRES_SOON_THRESHOLD_SECS;

        Ok(VerifiedToken {
            claims: session,
            expires_at,
            expires_soon,
        })
    }

    /// Revoke a token until its natural expiry.
    ///
    /// Returns `Ok(false)` when the token has already expired and nothing was
    /// recorded. The signature must still be valid.
    pub fn revoke(&self, token: &str) -> TokenResult<bool> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::NoToken);
        }

        let claims = self.decode_signed(token)?;
        let now = self.clock.now();
        if claims.exp <= now.timestamp() {
            debug!(jti = %claims.jti, "Skipping revocation of expired token");
            return Ok(false);
        }

        self.blacklist.add(token, timestamp_to_datetime(claims.exp)?);
        info!(jti = %claims.jti, username = %claims.username, "Token revoked");
        Ok(true)
    }

    /// Remove revocation entries whose tokens have expired.
    pub fn sweep_revocations(&self) -> usize {
        self.blacklist.sweep_at(self.clock.now())
    }

    pub fn revoked_count(&self) -> usize {
        self.blacklist.len()
    }

    fn decode_signed(&self, token: &str) -> TokenResult<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}

fn session_claims(claims: &Claims) -> TokenResult<SessionClaims> {
    if claims.sub.trim().is_empty() || claims.username.trim().is_empty() {
        return Err(TokenError::InvalidPayload);
    }
    let subject_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidPayload)?;

    Ok(SessionClaims {
        subject_id,
        username: claims.username.clone(),
        stream_key: claims.stream_key.clone(),
    })
}

fn timestamp_to_datetime(secs: i64) -> TokenResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or(TokenError::InvalidPayload)
}
