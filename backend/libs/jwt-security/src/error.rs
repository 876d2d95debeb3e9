//! Error types for token issuance and verification

use thiserror::Error;

/// Outcome of a failed token operation.
///
/// Every verification failure maps to exactly one variant so the HTTP layer can
/// render a stable error code without inspecting messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("No token provided")]
    NoToken,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token has expired")]
    Expired,

    #[error("Token is malformed or its signature is invalid")]
    Malformed,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Token issuer or audience is invalid")]
    InvalidIssuerOrAudience,

    #[error("Token payload is missing required claims")]
    InvalidPayload,

    #[error("JWT configuration error: {0}")]
    Config(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

pub type TokenResult<T> = std::result::Result<T, TokenError>;

impl TokenError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::NoToken => "NO_TOKEN",
            TokenError::Revoked => "TOKEN_REVOKED",
            TokenError::Expired => "TOKEN_EXPIRED",
            TokenError::Malformed | TokenError::InvalidPayload => "INVALID_TOKEN",
            TokenError::NotYetValid => "TOKEN_NOT_YET_VALID",
            TokenError::InvalidIssuerOrAudience => "INVALID_ISSUER_OR_AUDIENCE",
            TokenError::Config(_) => "CONFIG_ERROR",
            TokenError::Signing(_) => "INTERNAL_ERROR",
        }
    }

    /// Configuration and signing failures are server conditions, not client errors.
    pub fn is_server_condition(&self) -> bool {
        matches!(self, TokenError::Config(_) | TokenError::Signing(_))
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                TokenError::InvalidIssuerOrAudience
            }
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" || claim == "aud" => {
                TokenError::InvalidIssuerOrAudience
            }
            ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidPayload,
            _ => TokenError::Malformed,
        }
    }
}
