// ============================
// authgate-backend/src/auth/lifecycle.rs
// ============================
//! Session lifecycle: login, logout and the authentication guard.
//!
//! Per session: `Anonymous --login ok--> Authenticated --logout--> Anonymous`.
//! A failed login leaves the session as it was.
use authgate_common::PublicIdentity;
use std::sync::Arc;

use super::CredentialVerifier;
use crate::error::{AuthError, SessionError};
use crate::session::{Session, SessionStore};

/// Drives session state transitions for one request at a time.
#[derive(Clone)]
pub struct SessionLifecycle {
    verifier: CredentialVerifier,
    store: Arc<dyn SessionStore>,
}

impl SessionLifecycle {
    pub fn new(verifier: CredentialVerifier, store: Arc<dyn SessionStore>) -> Self {
        Self { verifier, store }
    }

    /// Verify the credentials and return the authenticated session.
    ///
    /// The returned session has a fresh id; `current` is never mutated.
    /// Unknown user and wrong password both come back as
    /// `InvalidCredentials`. Nothing is written unless verification
    /// succeeded.
    pub async fn login(
        &self,
        current: &Session,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let identity = match self.verifier.verify(username, password).await {
            Ok(identity) => identity,
            Err(AuthError::UnknownUser) => {
                tracing::info!(
                    target: "authgate::security",
                    username,
                    reason = "unknown_user",
                    "login rejected"
                );
                return Err(AuthError::InvalidCredentials);
            },
            Err(AuthError::InvalidCredentials) => {
                tracing::info!(
                    target: "authgate::security",
                    username,
                    reason = "bad_password",
                    "login rejected"
                );
                return Err(AuthError::InvalidCredentials);
            },
            Err(other) => return Err(other),
        };

        let authenticated = Session::authenticated(identity);
        self.store.set(&authenticated).await?;

        if current.is_authenticated() {
            // the old session is superseded; failing to drop it only leaves it to expire
            if let Err(err) = self.store.destroy(current.id()).await {
                tracing::warn!(
                    target: "authgate::security",
                    error = %err,
                    session = current.id().fingerprint(),
                    "superseded session not destroyed"
                );
            }
        }

        tracing::info!(
            target: "authgate::security",
            username,
            session = authenticated.id().fingerprint(),
            "login succeeded"
        );
        Ok(authenticated)
    }

    /// Destroy `current` and return a fresh anonymous session.
    ///
    /// An anonymous session is a no-op success. Otherwise exactly one
    /// destroy is attempted and its failure is reported as-is.
    pub async fn logout(&self, current: &Session) -> Result<Session, SessionError> {
        if !current.is_authenticated() {
            return Ok(Session::anonymous());
        }

        self.store.destroy(current.id()).await.map_err(|err| {
            tracing::error!(
                target: "authgate::security",
                error = %err,
                session = current.id().fingerprint(),
                "logout failed"
            );
            match err {
                SessionError::DestroyFailed(msg) | SessionError::Unavailable(msg) => {
                    SessionError::DestroyFailed(msg)
                },
            }
        })?;

        tracing::info!(
            target: "authgate::security",
            username = current.user().map(|u| u.username.as_str()).unwrap_or_default(),
            session = current.id().fingerprint(),
            "logout"
        );
        Ok(Session::anonymous())
    }
}

/// Guard for protected operations: the session's user, or `Unauthorized`.
pub fn require_authenticated(session: &Session) -> Result<&PublicIdentity, AuthError> {
    session.user().ok_or(AuthError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordHashing, ScryptHasher};
    use crate::session::{MemorySessionStore, SessionId, SessionState};
    use crate::storage::{CredentialRecord, InMemoryUserStore, UserStore};
    use async_trait::async_trait;

    async fn lifecycle() -> (SessionLifecycle, Arc<MemorySessionStore>) {
        let hasher = Arc::new(ScryptHasher::new(4, 8, 1).unwrap());
        let users = InMemoryUserStore::new();
        users
            .insert(CredentialRecord {
                username: "alice".to_string(),
                password_digest: hasher.hash("s3cret").unwrap(),
            })
            .await
            .unwrap();
        let store = Arc::new(MemorySessionStore::default());
        let verifier = CredentialVerifier::new(Arc::new(users), hasher);
        (SessionLifecycle::new(verifier, store.clone()), store)
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let (lifecycle, store) = lifecycle().await;
        let anon = Session::anonymous();
        assert_eq!(require_authenticated(&anon), Err(AuthError::Unauthorized));

        let session = lifecycle.login(&anon, "alice", "s3cret").await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(require_authenticated(&session).unwrap().username, "alice");
        assert_ne!(session.id(), anon.id());

        // read-your-writes: the store sees it immediately
        let stored = store.get(session.id()).await.unwrap().unwrap();
        assert_eq!(stored, session);

        let after = lifecycle.logout(&session).await.unwrap();
        assert_eq!(after.state(), SessionState::Anonymous);
        assert!(store.get(session.id()).await.unwrap().is_none());
        assert_eq!(require_authenticated(&after), Err(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_failures_are_indistinguishable() {
        let (lifecycle, store) = lifecycle().await;
        let anon = Session::anonymous();

        let wrong = lifecycle.login(&anon, "alice", "wrong").await.unwrap_err();
        let unknown = lifecycle.login(&anon, "bob", "whatever").await.unwrap_err();

        assert_eq!(wrong, AuthError::InvalidCredentials);
        assert_eq!(unknown, wrong);
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_logout_twice_is_fine() {
        let (lifecycle, _store) = lifecycle().await;
        let session = lifecycle
            .login(&Session::anonymous(), "alice", "s3cret")
            .await
            .unwrap();

        let anon = lifecycle.logout(&session).await.unwrap();
        assert!(lifecycle.logout(&anon).await.is_ok());
        // the stale authenticated value again: store treats unknown ids as gone
        assert!(lifecycle.logout(&session).await.is_ok());
    }

    #[tokio::test]
    async fn test_relogin_replaces_old_session() {
        let (lifecycle, store) = lifecycle().await;
        let first = lifecycle
            .login(&Session::anonymous(), "alice", "s3cret")
            .await
            .unwrap();
        let second = lifecycle.login(&first, "alice", "s3cret").await.unwrap();

        assert!(store.get(first.id()).await.unwrap().is_none());
        assert!(store.get(second.id()).await.unwrap().is_some());
    }

    struct BrokenStore {
        inner: MemorySessionStore,
    }

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
            self.inner.get(id).await
        }
        async fn set(&self, session: &Session) -> Result<(), SessionError> {
            self.inner.set(session).await
        }
        async fn destroy(&self, _id: &SessionId) -> Result<(), SessionError> {
            Err(SessionError::DestroyFailed("storage offline".to_string()))
        }
        async fn cleanup_expired(&self) -> Result<usize, SessionError> {
            Ok(0)
        }
        async fn active_count(&self) -> usize {
            self.inner.active_count().await
        }
    }

    #[tokio::test]
    async fn test_destroy_failure_is_reported() {
        let hasher = Arc::new(ScryptHasher::new(4, 8, 1).unwrap());
        let users = InMemoryUserStore::new();
        users
            .insert(CredentialRecord {
                username: "alice".to_string(),
                password_digest: hasher.hash("s3cret").unwrap(),
            })
            .await
            .unwrap();
        let lifecycle = SessionLifecycle::new(
            CredentialVerifier::new(Arc::new(users), hasher),
            Arc::new(BrokenStore {
                inner: MemorySessionStore::default(),
            }),
        );

        let session = lifecycle
            .login(&Session::anonymous(), "alice", "s3cret")
            .await
            .unwrap();
        assert!(matches!(
            lifecycle.logout(&session).await,
            Err(SessionError::DestroyFailed(_))
        ));
        // anonymous logout never touches the store
        assert!(lifecycle.logout(&Session::anonymous()).await.is_ok());
    }
}
