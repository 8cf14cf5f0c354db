// ================
// common/src/lib.rs
// ================
//! Wire types shared between the `authgate` server and its clients.
//!
//! Everything here is what crosses the HTTP boundary. Password digests
//! never appear in these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Public projection of a credential record.
///
/// This is the only identity data a session ever carries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicIdentity {
    pub username: String,
}

impl PublicIdentity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Login attempt as submitted by an HTML form.
///
/// The cleartext password is wiped from memory when the form is dropped.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body returned by a successful login.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub status: String,
    pub user: PublicIdentity,
}

/// Generic `{"status": ...}` acknowledgement.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// What a protected page may reveal about the caller's session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user: PublicIdentity,
    pub created_at: DateTime<Utc>,
}

/// Error detail inside an [`ErrorBody`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// JSON envelope for every error response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}
