// ============================
// authgate-backend/src/auth/mod.rs
// ============================
//! Authentication module.
pub mod lifecycle;
pub mod password;
pub mod rate_limit;
pub mod token_generator;
pub mod verifier;

pub use lifecycle::{require_authenticated, SessionLifecycle};
pub use password::{
    validate_password_strength, PasswordHashing, PasswordRequirements, ScryptHasher,
    MIN_PASSWORD_LENGTH,
};
pub use rate_limit::AuthRateLimiter;
pub use verifier::CredentialVerifier;
