// ============================
// authgate-backend/src/session/mod.rs
// ============================
//! Session model and the session-store collaborator.
//!
//! A [`Session`] is a plain value. Handlers receive it, hand it to the
//! lifecycle manager, and get a new value back; nothing keeps a
//! reference to it past the request.
pub mod memory;
pub mod persistent;

use async_trait::async_trait;
use authgate_common::PublicIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::token_generator::{generate_secure_token, is_well_formed};
use crate::error::SessionError;

pub use memory::MemorySessionStore;
pub use persistent::PersistentSessionStore;

/// Opaque session identifier carried in the session cookie.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh 256-bit random identifier.
    pub fn generate() -> Self {
        Self(generate_secure_token())
    }

    /// Accept a cookie value only if it has the shape of a generated id.
    pub fn parse(raw: &str) -> Option<Self> {
        is_well_formed(raw).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to put in logs.
    pub fn fingerprint(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}..)", self.fingerprint())
    }
}

/// Whether a session has a user attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// One browsing context.
///
/// `user` is either absent or a complete public identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    user: Option<PublicIdentity>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// A session nobody has logged into.
    pub fn anonymous() -> Self {
        Self {
            id: SessionId::generate(),
            user: None,
            created_at: Utc::now(),
        }
    }

    /// A brand-new session (fresh id) carrying `user`.
    pub fn authenticated(user: PublicIdentity) -> Self {
        Self {
            id: SessionId::generate(),
            user: Some(user),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user(&self) -> Option<&PublicIdentity> {
        self.user.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        match self.user {
            Some(_) => SessionState::Authenticated,
            None => SessionState::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }
}

/// Backing store for sessions. Owns expiry.
///
/// Implementations must give read-your-writes per session id: a `set`
/// that returned `Ok` is visible to the next `get` of the same id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live session for `id`, or `None` if unknown or expired.
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError>;

    /// Insert or atomically replace the session under its id.
    async fn set(&self, session: &Session) -> Result<(), SessionError>;

    /// Invalidate `id`. Unknown ids are not an error.
    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError>;

    /// Drop every expired session, returning how many went.
    async fn cleanup_expired(&self) -> Result<usize, SessionError>;

    /// Number of sessions currently held.
    async fn active_count(&self) -> usize;
}
