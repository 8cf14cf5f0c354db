// ============================
// authgate-backend/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Params, Scrypt,
};
use serde::{Deserialize, Serialize};

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 10;

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

/// The slow, salted hashing primitive the credential verifier relies on.
///
/// Both methods are CPU-bound; async callers run them on the blocking pool.
pub trait PasswordHashing: Send + Sync {
    /// Produce a self-describing digest (PHC string) for `plain`.
    fn hash(&self, plain: &str) -> anyhow::Result<String>;

    /// Constant-time check of `plain` against `digest`.
    /// A digest that does not parse never matches.
    fn compare(&self, plain: &str, digest: &str) -> bool;
}

/// scrypt with configurable cost.
#[derive(Debug, Clone, Copy)]
pub struct ScryptHasher {
    params: Params,
}

impl ScryptHasher {
    pub fn new(log_n: u8, r: u32, p: u32) -> anyhow::Result<Self> {
        let params = Params::new(log_n, r, p, Params::RECOMMENDED_LEN)
            .map_err(|e| anyhow::anyhow!("invalid scrypt parameters: {e}"))?;
        Ok(Self { params })
    }
}

impl Default for ScryptHasher {
    fn default() -> Self {
        Self {
            params: Params::recommended(),
        }
    }
}

impl PasswordHashing for ScryptHasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Scrypt
            .hash_password_customized(plain.as_bytes(), None, None, self.params, &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
            .to_string();
        Ok(hash)
    }

    fn compare(&self, plain: &str, digest: &str) -> bool {
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
    }
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}
