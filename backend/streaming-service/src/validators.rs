use once_cell::sync::Lazy;
use regex::Regex;

/// Input validation for account requests

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 128;

// Hardcoded pattern, compiled once
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{3,30}$")
        .expect("hardcoded username regex is invalid - fix source code")
});

/// 3-30 characters, ASCII alphanumeric plus `-` and `_`.
/// Usernames end up inside stream keys, so they share the key alphabet.
pub fn validate_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Length in characters, 6-128
pub fn validate_password(password: &str) -> bool {
    let len = password.chars().count();
    (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len)
}
