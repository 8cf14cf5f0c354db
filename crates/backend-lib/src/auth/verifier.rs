// ============================
// authgate-backend/src/auth/verifier.rs
// ============================
//! Credential verification: username + cleartext password -> identity.
use authgate_common::PublicIdentity;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use zeroize::Zeroizing;

use super::PasswordHashing;
use crate::error::AuthError;
use crate::storage::UserStore;

/// Verifies login attempts against the credential store.
///
/// Read-only: never mutates records or sessions.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHashing>,
    /// Digest compared against when the username is unknown, so both
    /// failure paths cost one hash comparison.
    decoy_digest: Arc<OnceCell<String>>,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, hasher: Arc<dyn PasswordHashing>) -> Self {
        Self {
            users,
            hasher,
            decoy_digest: Arc::new(OnceCell::new()),
        }
    }

    /// Resolve `username`/`password` to the principal's public identity.
    ///
    /// Fails with `UnknownUser` when no record exists and
    /// `InvalidCredentials` when the password does not match. Empty
    /// inputs never match anything.
    pub async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<PublicIdentity, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let record = self
            .users
            .find_by_username(username)
            .await
            .map_err(|e| AuthError::Internal(format!("credential lookup failed: {e}")))?;

        let hasher = Arc::clone(&self.hasher);
        let password = Zeroizing::new(password.to_owned());

        let Some(record) = record else {
            let decoy = Arc::clone(&self.decoy_digest);
            tokio::task::spawn_blocking(move || {
                if let Ok(digest) = decoy.get_or_try_init(|| hasher.hash("authgate-decoy")) {
                    let _ = hasher.compare(&password, digest);
                }
            })
            .await
            .map_err(|e| AuthError::Internal(format!("hash task failed: {e}")))?;
            return Err(AuthError::UnknownUser);
        };

        let digest = record.password_digest.clone();
        let matched = tokio::task::spawn_blocking(move || hasher.compare(&password, &digest))
            .await
            .map_err(|e| AuthError::Internal(format!("hash task failed: {e}")))?;

        if matched {
            Ok(record.public_identity())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}
