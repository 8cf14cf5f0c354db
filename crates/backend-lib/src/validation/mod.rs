// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for credential data.
//!
//! Usernames are compared byte-for-byte: `Alice` and `alice` are two
//! different principals. The grammar below keeps them safe to use as
//! file names.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::auth::{validate_password_strength, PasswordRequirements};

pub const MAX_USERNAME_LENGTH: usize = 64;
const MAX_PASSWORD_LENGTH: usize = 1024;

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,64}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// `true` if `username` matches the account-name grammar.
pub fn is_valid_username(username: &str) -> bool {
    // dot-only names would be path components
    USERNAME_REGEX.is_match(username) && username.chars().any(|c| c != '.')
}

/// Validate a username for a new credential record
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    if username.is_empty() {
        return Err(ValidationError::InvalidUsername(
            "Username must not be empty".to_string(),
        ));
    }

    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }

    if !is_valid_username(username) {
        return Err(ValidationError::InvalidUsername(
            "Username may contain only letters, digits, '.', '_' and '-'".to_string(),
        ));
    }

    Ok(username)
}

/// Validate a password for a new credential record.
///
/// `requirements` is `None` when importing fixture data, which only
/// needs the password to be non-empty.
pub fn validate_new_password<'a>(
    password: &'a str,
    requirements: Option<&PasswordRequirements>,
) -> ValidationResult<&'a str> {
    if password.is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password must not be empty".to_string(),
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} bytes"
        )));
    }

    if let Some(req) = requirements {
        if !validate_password_strength(password, req) {
            return Err(ValidationError::InvalidPassword(format!(
                "Password must be at least {} characters and satisfy the configured complexity rules",
                req.min_length
            )));
        }
    }

    Ok(password)
}
