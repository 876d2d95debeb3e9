//! Service configuration
//!
//! Loaded once at startup from environment variables (a `.env` file is
//! honoured). Anything malformed stops the process before it binds.

pub mod streaming_config;

pub use actix_middleware::RateLimitConfig;
pub use streaming_config::{StreamingConfig, MAX_STREAM_TIMEOUT_SECS};

use anyhow::{bail, Context, Result};
use jwt_security::TokenConfig;
use std::fmt;
use std::str::FromStr;

/// Session tokens live at most 30 days
pub const MAX_JWT_EXPIRES_IN_SECS: i64 = 30 * 86_400;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_in_secs: i64,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

impl JwtSettings {
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.secret.clone(),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            expires_in: chrono::Duration::seconds(self.expires_in_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtSettings,
    pub rate_limit: RateLimitConfig,
    pub streaming: StreamingConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None => bail!("JWT_SECRET must be set"),
        };

        let config = Self {
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&var, "PORT", 8088)?,
            },
            jwt: JwtSettings {
                secret,
                issuer: var("JWT_ISSUER").unwrap_or_else(|| "stream-gatekeeper".to_string()),
                audience: var("JWT_AUDIENCE")
                    .unwrap_or_else(|| "stream-gatekeeper-clients".to_string()),
                expires_in_secs: parse_or(&var, "JWT_EXPIRES_IN_SECS", 86_400)?,
            },
            rate_limit: RateLimitConfig {
                window_seconds: parse_or(&var, "RATE_LIMIT_WINDOW_SECS", 900)?,
                max_requests: parse_or(&var, "RATE_LIMIT_MAX_REQUESTS", 100)?,
                trust_forwarded_headers: parse_or(&var, "RATE_LIMIT_TRUST_PROXY", false)?,
            },
            streaming: StreamingConfig {
                hls_base_url: var("HLS_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| StreamingConfig::default().hls_base_url),
                stream_timeout_secs: parse_or(&var, "STREAM_TIMEOUT_SECS", 60)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_JWT_EXPIRES_IN_SECS).contains(&self.jwt.expires_in_secs) {
            bail!(
                "JWT_EXPIRES_IN_SECS must be between 1 and {MAX_JWT_EXPIRES_IN_SECS}, got {}",
                self.jwt.expires_in_secs
            );
        }
        if self.rate_limit.window_seconds == 0 || self.rate_limit.max_requests == 0 {
            bail!("RATE_LIMIT_WINDOW_SECS and RATE_LIMIT_MAX_REQUESTS must be positive");
        }
        if !(1..=MAX_STREAM_TIMEOUT_SECS).contains(&self.streaming.stream_timeout_secs) {
            bail!(
                "STREAM_TIMEOUT_SECS must be between 1 and {MAX_STREAM_TIMEOUT_SECS}, got {}",
                self.streaming.stream_timeout_secs
            );
        }
        Ok(())
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
