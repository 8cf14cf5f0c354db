// ============================
// authgate-backend/src/lib.rs
// ============================
//! Core library for the `authgate` login/session server.

pub mod auth;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod router;
pub mod session;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use crate::auth::{AuthRateLimiter, CredentialVerifier, PasswordHashing, SessionLifecycle};
use crate::config::Settings;
use crate::pipeline::{LoginThrottle, Pipeline, RequireAuthenticated};
use crate::session::{MemorySessionStore, PersistentSessionStore, SessionStore};
use crate::storage::{FlatFileUserStore, UserStore};

pub use router::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Credential records
    pub users: Arc<dyn UserStore>,
    /// Session store, shared with the lifecycle manager
    pub sessions: Arc<dyn SessionStore>,
    pub lifecycle: Arc<SessionLifecycle>,
    pub auth_rate_limiter: Arc<AuthRateLimiter>,
    /// Stages every protected route runs
    pub protected: Pipeline,
    /// Stages the login route runs before verifying credentials
    pub login_gate: Pipeline,
}

impl AppState {
    /// Wire the state from already-built collaborators.
    pub fn new(
        settings: Settings,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn PasswordHashing>,
    ) -> Self {
        let verifier = CredentialVerifier::new(Arc::clone(&users), hasher);
        let lifecycle = Arc::new(SessionLifecycle::new(verifier, Arc::clone(&sessions)));
        let auth_rate_limiter = Arc::new(AuthRateLimiter::new(
            settings.auth_rate_limit.max_attempts,
            std::time::Duration::from_secs(settings.auth_rate_limit.lockout_secs),
        ));

        let protected = Pipeline::new().with_stage(RequireAuthenticated);
        let login_gate =
            Pipeline::new().with_stage(LoginThrottle::new(Arc::clone(&auth_rate_limiter)));

        Self {
            settings: Arc::new(settings),
            users,
            sessions,
            lifecycle,
            auth_rate_limiter,
            protected,
            login_gate,
        }
    }

    /// Build the production state: flat-file users under `storage.path`
    /// and a memory or persistent session store.
    pub async fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let users: Arc<dyn UserStore> = Arc::new(FlatFileUserStore::new(&settings.storage.path)?);
        let hasher = Arc::new(settings.password.hasher()?);

        let memory = MemorySessionStore::new(
            settings.session.absolute_ttl(),
            settings.session.idle_ttl(),
        );
        let sessions: Arc<dyn SessionStore> = if settings.session.persist {
            let path = settings.storage.path.join("sessions");
            Arc::new(PersistentSessionStore::open(path, memory).await?)
        } else {
            Arc::new(memory)
        };

        Ok(Self::new(settings, users, sessions, hasher))
    }
}
