/// Password hashing and verification using Argon2id
use crate::error::{AppError, Result};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use once_cell::sync::Lazy;

/// Hash with the same Argon2 parameters as real accounts, used to spend
/// equal work when the username is unknown.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("gatekeeper-unknown-user").ok());

/// Hash a password into a PHC string suitable for the user store.
/// Length rules are enforced by the caller.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(rand::thread_rng());

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash format".to_string()))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::InvalidCredentials)
}

/// Run a verification that always fails, so an unknown username costs the
/// same as a wrong password.
pub fn verify_password_unknown_user(password: &str) -> AppError {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    AppError::InvalidCredentials
}
