// ============================
// authgate-backend/src/storage.rs
// ============================
//! Credential record storage with in-memory and flat-file backends.
use async_trait::async_trait;
use authgate_common::PublicIdentity;
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs as tokio_fs, io::AsyncWriteExt};

use crate::auth::{PasswordHashing, PasswordRequirements};
use crate::error::AppError;
use crate::validation::{is_valid_username, validate_new_password, validate_username};

/// Stored identity and password digest for one principal.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    pub username: String,
    pub password_digest: String,
}

impl CredentialRecord {
    /// The part of the record that may leave the auth core.
    pub fn public_identity(&self) -> PublicIdentity {
        PublicIdentity::new(self.username.clone())
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Build a credential record, validating the username and hashing the password.
pub fn new_credential(
    hasher: &dyn PasswordHashing,
    username: &str,
    password: &str,
    requirements: Option<&PasswordRequirements>,
) -> Result<CredentialRecord, AppError> {
    validate_username(username).map_err(|e| AppError::InvalidInput(e.to_string()))?;
    validate_new_password(password, requirements)
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let password_digest = hasher
        .hash(password)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(CredentialRecord {
        username: username.to_string(),
        password_digest,
    })
}

/// Trait for credential record backends
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up exactly one record by exact, case-sensitive username.
    async fn find_by_username(&self, username: &str)
        -> Result<Option<CredentialRecord>, AppError>;

    /// Store a new record. Fails with `Conflict` if the username is taken.
    async fn insert(&self, record: CredentialRecord) -> Result<(), AppError>;
}

/// Records kept in a concurrent map.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    records: Arc<DashMap<String, CredentialRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AppError> {
        Ok(self.records.get(username).map(|r| r.value().clone()))
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), AppError> {
        match self.records.entry(record.username.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(record.username)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            },
        }
    }
}

/// One JSON file per user under `<root>/users/`.
#[derive(Clone)]
pub struct FlatFileUserStore {
    root: PathBuf,
}

impl FlatFileUserStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("users"))?;
        Ok(Self { root })
    }

    fn record_path(&self, username: &str) -> PathBuf {
        self.root.join("users").join(format!("{username}.json"))
    }
}

#[async_trait]
impl UserStore for FlatFileUserStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AppError> {
        // anything outside the grammar cannot name a stored record
        if !is_valid_username(username) {
            return Ok(None);
        }

        let content = match tokio_fs::read_to_string(self.record_path(username)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: CredentialRecord = serde_json::from_str(&content)?;

        // case-folding filesystems can hand back a different user's file
        if record.username != username {
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), AppError> {
        validate_username(&record.username)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let json = serde_json::to_string_pretty(&record)?;

        let mut file = match tokio_fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.record_path(&record.username))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::Conflict(record.username));
            },
            Err(e) => return Err(e.into()),
        };

        file.write_all(json.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
