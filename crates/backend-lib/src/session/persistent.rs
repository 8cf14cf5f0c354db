// ============================
// authgate-backend/src/session/persistent.rs
// ============================
//! Persistent session storage with encryption.
//!
//! Wraps [`MemorySessionStore`] and writes an AES-256-GCM encrypted
//! snapshot after every mutation, so sessions survive server restarts.
//! Activity seen by `get` is written at most once per flush interval.
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{fs as tokio_fs, sync::Mutex};

use super::{MemorySessionStore, Session, SessionId, SessionStore};
use crate::error::SessionError;

const NONCE_LEN: usize = 12;
const KEY_FILE: &str = "session_key";
const SNAPSHOT_FILE: &str = "sessions.dat";

/// How stale the snapshot's activity times may get before `get` rewrites it.
const DEFAULT_ACTIVITY_FLUSH: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    session: Session,
    last_active: DateTime<Utc>,
}

/// Session store backed by an encrypted file.
#[derive(Clone)]
pub struct PersistentSessionStore {
    inner: MemorySessionStore,
    storage_path: PathBuf,
    encryption_key: [u8; 32],
    /// Serialises snapshot writers
    save_lock: Arc<Mutex<()>>,
    /// Unix millis of the last successful snapshot
    last_saved_ms: Arc<AtomicI64>,
    activity_flush: Duration,
}

impl std::fmt::Debug for PersistentSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentSessionStore")
            .field("storage_path", &self.storage_path)
            .finish_non_exhaustive()
    }
}

fn load_or_create_key(key_path: &Path) -> anyhow::Result<[u8; 32]> {
    if key_path.exists() {
        let key_data = fs::read(key_path)
            .with_context(|| format!("reading session key {}", key_path.display()))?;
        let key: [u8; 32] = key_data
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid encryption key length"))?;
        return Ok(key);
    }

    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    fs::write(key_path, key)
        .with_context(|| format!("writing session key {}", key_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(key_path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(key)
}

/// Generate a random nonce for AES-GCM
fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

impl PersistentSessionStore {
    /** Open (or create) the store under `storage_path`
    # Arguments
    * `storage_path` - Directory holding the key and the snapshot
    * `inner` - Memory store that carries the expiry policy */
    pub async fn open<P: AsRef<Path>>(
        storage_path: P,
        inner: MemorySessionStore,
    ) -> anyhow::Result<Self> {
        let storage_path = storage_path.as_ref().to_path_buf();
        fs::create_dir_all(&storage_path)?;

        let encryption_key = load_or_create_key(&storage_path.join(KEY_FILE))?;

        let store = Self {
            inner,
            storage_path,
            encryption_key,
            save_lock: Arc::new(Mutex::new(())),
            last_saved_ms: Arc::new(AtomicI64::new(Utc::now().timestamp_millis())),
            activity_flush: DEFAULT_ACTIVITY_FLUSH,
        };

        let loaded = store.load_sessions().await?;
        tracing::info!(
            target: "authgate::security",
            loaded,
            path = %store.storage_path.display(),
            "session snapshot loaded"
        );

        Ok(store)
    }

    /// How often session activity from `get` reaches the snapshot.
    pub fn with_activity_flush(mut self, every: Duration) -> Self {
        self.activity_flush = every;
        self
    }

    fn activity_is_stale(&self) -> bool {
        let since = Utc::now().timestamp_millis() - self.last_saved_ms.load(Ordering::Relaxed);
        since >= 0 && since as u128 >= self.activity_flush.as_millis()
    }

    fn cipher(&self) -> anyhow::Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.encryption_key)
            .map_err(|_| anyhow::anyhow!("Invalid encryption key length"))
    }

    /// Write the current sessions to disk
    pub async fn save_sessions(&self) -> anyhow::Result<()> {
        let _guard = self.save_lock.lock().await;

        let entries: Vec<PersistedSession> = self
            .inner
            .snapshot()
            .into_iter()
            .map(|(session, last_active)| PersistedSession {
                session,
                last_active,
            })
            .collect();
        let json = serde_json::to_vec(&entries)?;

        let nonce_bytes = generate_nonce();
        let encrypted = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), json.as_slice())
            .map_err(|_| anyhow::anyhow!("Encryption failed"))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + encrypted.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&encrypted);

        // write-then-rename so a crash never leaves half a snapshot
        let target = self.storage_path.join(SNAPSHOT_FILE);
        let staging = self.storage_path.join(format!("{SNAPSHOT_FILE}.tmp"));
        tokio_fs::write(&staging, &combined).await?;
        tokio_fs::rename(&staging, &target).await?;
        self.last_saved_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);

        tracing::debug!(count = entries.len(), "session snapshot saved");
        Ok(())
    }

    /// Load sessions from disk, returning how many were still live
    async fn load_sessions(&self) -> anyhow::Result<usize> {
        let path = self.storage_path.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(0);
        }

        let combined = tokio_fs::read(&path).await?;
        if combined.len() < NONCE_LEN {
            return Err(anyhow::anyhow!("Invalid session file"));
        }
        let (nonce_bytes, encrypted) = combined.split_at(NONCE_LEN);

        let decrypted = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
            .map_err(|_| {
                tracing::error!(
                    target: "authgate::security",
                    path = %path.display(),
                    "session snapshot failed to decrypt"
                );
                anyhow::anyhow!("Decryption failed")
            })?;

        let entries: Vec<PersistedSession> = serde_json::from_slice(&decrypted)?;
        let loaded = entries
            .into_iter()
            .filter(|e| self.inner.restore(e.session.clone(), e.last_active))
            .count();

        Ok(loaded)
    }
}

#[async_trait]
impl SessionStore for PersistentSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        let found = self.inner.get(id).await?;

        if found.is_some() && self.activity_is_stale() {
            // the session is still live in memory
            if let Err(err) = self.save_sessions().await {
                tracing::warn!(error = %err, "failed to persist session activity");
            }
        }
        Ok(found)
    }

    async fn set(&self, session: &Session) -> Result<(), SessionError> {
        self.inner.set(session).await?;

        if let Err(err) = self.save_sessions().await {
            // not durable, so not stored
            self.inner.destroy(session.id()).await?;
            tracing::error!(
                target: "authgate::security",
                error = %err,
                session = session.id().fingerprint(),
                "failed to persist session"
            );
            return Err(SessionError::Unavailable(err.to_string()));
        }
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        self.inner.destroy(id).await?;

        self.save_sessions().await.map_err(|err| {
            tracing::error!(
                target: "authgate::security",
                error = %err,
                session = id.fingerprint(),
                "destroyed session may survive a restart"
            );
            SessionError::DestroyFailed(err.to_string())
        })
    }

    async fn cleanup_expired(&self) -> Result<usize, SessionError> {
        let removed = self.inner.sweep();
        if removed > 0 {
            self.save_sessions()
                .await
                .map_err(|err| SessionError::Unavailable(err.to_string()))?;
        }
        Ok(removed)
    }

    async fn active_count(&self) -> usize {
        self.inner.active_count().await
    }
}
