// ============================
// authgate-backend/src/session/memory.rs
// ============================
//! In-process session store with idle and absolute expiry.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use super::{Session, SessionId, SessionStore};
use crate::error::SessionError;
use crate::metrics;

/// Absolute session lifetime (24 hours)
pub const SESSION_ABSOLUTE_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Idle timeout (30 minutes)
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 30);

#[derive(Debug, Clone)]
struct StoredSession {
    session: Session,
    last_active: DateTime<Utc>,
}

/// Sessions in a concurrent map, one entry per id.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<SessionId, StoredSession>>,
    absolute_ttl: Duration,
    idle_ttl: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(SESSION_ABSOLUTE_TTL, SESSION_IDLE_TTL)
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

impl MemorySessionStore {
    pub fn new(absolute_ttl: Duration, idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            absolute_ttl,
            idle_ttl,
        }
    }

    fn expired(&self, session: &Session, last_active: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        elapsed(session.created_at(), now) >= self.absolute_ttl
            || elapsed(last_active, now) >= self.idle_ttl
    }

    /// Every live entry with its last-activity time.
    pub(crate) fn snapshot(&self) -> Vec<(Session, DateTime<Utc>)> {
        let now = Utc::now();
        self.sessions
            .iter()
            .filter(|e| !self.expired(&e.session, e.last_active, now))
            .map(|e| (e.session.clone(), e.last_active))
            .collect()
    }

    /// Re-insert a session read back from disk. Expired ones are dropped.
    pub(crate) fn restore(&self, session: Session, last_active: DateTime<Utc>) -> bool {
        if self.expired(&session, last_active, Utc::now()) {
            return false;
        }
        self.sessions.insert(
            session.id().clone(),
            StoredSession {
                session,
                last_active,
            },
        );
        true
    }

    /// Remove expired sessions.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| !self.expired(&entry.session, entry.last_active, now));
        let after = self.sessions.len();
        let removed = before.saturating_sub(after);

        if removed > 0 {
            ::metrics::counter!(metrics::SESSION_EXPIRED).increment(removed as u64);
        }
        ::metrics::gauge!(metrics::SESSION_ACTIVE).set(after as f64);

        removed
    }

    /// Run `cleanup_expired` on `store` every `every` until the runtime stops.
    pub fn spawn_cleanup_task(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.cleanup_expired().await {
                    Ok(0) => {},
                    Ok(removed) => tracing::debug!(removed, "expired sessions removed"),
                    Err(err) => tracing::warn!(error = %err, "session cleanup failed"),
                }
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let now = Utc::now();

        {
            let Some(mut entry) = self.sessions.get_mut(id) else {
                return Ok(None);
            };
            if !self.expired(&entry.session, entry.last_active, now) {
                entry.last_active = now;
                return Ok(Some(entry.session.clone()));
            }
        }

        // re-check under the removal lock; a concurrent `set` may have replaced it
        if self
            .sessions
            .remove_if(id, |_, e| self.expired(&e.session, e.last_active, now))
            .is_some()
        {
            ::metrics::counter!(metrics::SESSION_EXPIRED).increment(1);
        }
        Ok(None)
    }

    async fn set(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions.insert(
            session.id().clone(),
            StoredSession {
                session: session.clone(),
                last_active: Utc::now(),
            },
        );
        ::metrics::gauge!(metrics::SESSION_ACTIVE).set(self.sessions.len() as f64);
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        self.sessions.remove(id);
        ::metrics::gauge!(metrics::SESSION_ACTIVE).set(self.sessions.len() as f64);
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize, SessionError> {
        Ok(self.sweep())
    }

    async fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
