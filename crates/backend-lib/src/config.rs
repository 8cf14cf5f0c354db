// ============================
// authgate-backend/src/config.rs
// ============================
//! Configuration management.
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{PasswordRequirements, ScryptHasher};

/// Environment variable prefix; `__` separates sections.
pub const ENV_PREFIX: &str = "AUTHGATE_";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub session: SessionSettings,
    pub password: PasswordSettings,
    pub auth_rate_limit: AuthRateLimitSettings,
    pub logging: LoggingSettings,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Take the client address from `x-real-ip`/`x-forwarded-for`.
    /// Only set this behind a reverse proxy that overwrites both headers.
    pub trust_proxy_headers: bool,
}

/// Where user records and persisted sessions live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub path: PathBuf,
}

/// Session cookie and expiry settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Add `Secure` to the cookie (serve over HTTPS when set)
    pub secure_cookie: bool,
    pub idle_ttl_secs: u64,
    pub absolute_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Keep sessions in an encrypted file across restarts
    pub persist: bool,
}

/// scrypt cost and password rules for new credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PasswordSettings {
    pub scrypt_log_n: u8,
    pub scrypt_r: u32,
    pub scrypt_p: u32,
    pub requirements: PasswordRequirements,
}

/// Login throttling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthRateLimitSettings {
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Log filter and output format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            trust_proxy_headers: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "authgate.sid".to_string(),
            secure_cookie: false,
            idle_ttl_secs: 30 * 60,
            absolute_ttl_secs: 24 * 60 * 60,
            cleanup_interval_secs: 15 * 60,
            persist: false,
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            scrypt_log_n: 15,
            scrypt_r: 8,
            scrypt_p: 1,
            requirements: PasswordRequirements::default(),
        }
    }
}

impl Default for AuthRateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl SessionSettings {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn absolute_ttl(&self) -> Duration {
        Duration::from_secs(self.absolute_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl PasswordSettings {
    pub fn hasher(&self) -> Result<ScryptHasher> {
        ScryptHasher::new(self.scrypt_log_n, self.scrypt_r, self.scrypt_p)
    }
}

impl Settings {
    /// Layered load: defaults, then the TOML file (if present), then
    /// `AUTHGATE_*` variables, then a bare `PORT`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        figment = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                figment.merge(Toml::file(path))
            },
            None => figment.merge(Toml::file("config.toml")),
        };

        let settings: Settings = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            bail!("server.host must not be empty");
        }
        if self.server.port == 0 {
            bail!("server.port must not be 0");
        }
        if self.session.cookie_name.is_empty()
            || !self
                .session
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
        {
            bail!("session.cookie_name must be a non-empty token");
        }
        if self.session.idle_ttl_secs == 0 || self.session.absolute_ttl_secs == 0 {
            bail!("session TTLs must be greater than zero");
        }
        if self.session.idle_ttl_secs > self.session.absolute_ttl_secs {
            bail!("session.idle_ttl_secs must not exceed session.absolute_ttl_secs");
        }
        if self.session.cleanup_interval_secs == 0 {
            bail!("session.cleanup_interval_secs must be greater than zero");
        }
        if self.password.requirements.min_length < 8 {
            bail!("password.requirements.min_length must be at least 8");
        }
        self.password.hasher()?;
        if self.auth_rate_limit.max_attempts == 0 {
            bail!("auth_rate_limit.max_attempts must be greater than zero");
        }
        if self.auth_rate_limit.lockout_secs == 0 {
            bail!("auth_rate_limit.lockout_secs must be greater than zero");
        }
        self.logging
            .level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow::anyhow!("unknown log level {:?}", self.logging.level))?;
        Ok(())
    }
}
