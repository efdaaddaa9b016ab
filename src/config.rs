//! Provisioner configuration.
//!
//! The pgAdmin pod is located through [`PgAdminTarget`], either from
//! environment variables or from the `target` section of a
//! [`UsersManifest`]. The manifest is a JSON document listing the logins to
//! converge:
//!
//! ```json
//! {
//!   "target": { "namespace": "postgres-operator", "pod": "hippo-pgadmin-0" },
//!   "backoff": { "baseMs": 35, "ratio": 1.5, "maxMs": 2000, "jitter": "small" },
//!   "users": [
//!     {
//!       "username": "rhino",
//!       "passwordSecret": { "name": "hippo-pguser-rhino", "key": "password" },
//!       "server": { "name": "hippo", "host": "hippo-primary", "port": 5432 }
//!     }
//!   ],
//!   "prune": true
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::{ExponentialBackoffPolicy, JitterMode};

/// Container running pgAdmin in the pod.
pub const DEFAULT_CONTAINER: &str = "pgadmin";

/// Location of pgAdmin's SQLite database inside the container.
pub const DEFAULT_DATABASE_PATH: &str = "/var/lib/pgadmin/pgadmin4.db";

/// Column separator passed to `sqlite3 -separator`.
pub const DEFAULT_SEPARATOR: &str = ",";

pub const ENV_NAMESPACE: &str = "PGADMIN_NAMESPACE";
pub const ENV_POD: &str = "PGADMIN_POD";
pub const ENV_CONTAINER: &str = "PGADMIN_CONTAINER";
pub const ENV_DATABASE_PATH: &str = "PGADMIN_DATABASE_PATH";
pub const ENV_USERS_MANIFEST: &str = "PGADMIN_USERS_MANIFEST";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Location of one pgAdmin database.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PgAdminTarget {
    pub namespace: String,
    pub pod: String,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

impl PgAdminTarget {
    /// Target the default container and database path of `pod`.
    pub fn new(namespace: impl Into<String>, pod: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: default_container(),
            database_path: default_database_path(),
        }
    }

    /// Read the target from `PGADMIN_*` environment variables.
    ///
    /// Namespace and pod are required; container and database path fall
    /// back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };

        let mut target = Self::new(required(ENV_NAMESPACE)?, required(ENV_POD)?);
        if let Some(container) = lookup(ENV_CONTAINER).filter(|v| !v.is_empty()) {
            target.container = container;
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|v| !v.is_empty()) {
            target.database_path = path;
        }
        Ok(target)
    }
}

/// Serializable form of [`ExponentialBackoffPolicy`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffSettings {
    pub base_ms: u64,
    pub ratio: f64,
    /// Zero disables the ceiling.
    pub max_ms: u64,
    pub jitter: JitterMode,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        let policy = ExponentialBackoffPolicy::default();
        Self {
            base_ms: u64::try_from(policy.base.as_millis()).unwrap_or(u64::MAX),
            ratio: policy.ratio,
            max_ms: u64::try_from(policy.maximum.as_millis()).unwrap_or(u64::MAX),
            jitter: policy.jitter,
        }
    }
}

impl BackoffSettings {
    /// Reject settings that would produce a shrinking or undefined delay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ratio.is_finite() || self.ratio < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff ratio must be a finite number >= 1, got {}",
                self.ratio
            )));
        }
        Ok(())
    }
}

impl From<BackoffSettings> for ExponentialBackoffPolicy {
    fn from(settings: BackoffSettings) -> Self {
        Self {
            base: Duration::from_millis(settings.base_ms),
            ratio: settings.ratio,
            maximum: Duration::from_millis(settings.max_ms),
            jitter: settings.jitter,
        }
    }
}

/// Reference to one key of a Secret in the target namespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    pub name: String,
    #[serde(default = "default_secret_key")]
    pub key: String,
}

fn default_secret_key() -> String {
    "password".to_string()
}

/// Saved server connection for a login. Its password is the login's own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_maintenance_db")]
    pub maintenance_db: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default)]
    pub comment: String,
}

fn default_port() -> u16 {
    5432
}

fn default_maintenance_db() -> String {
    "postgres".to_string()
}

fn default_ssl_mode() -> String {
    "prefer".to_string()
}

/// One desired pgAdmin login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    pub username: String,
    pub password_secret: SecretKeyRef,
    #[serde(default)]
    pub server: Option<ServerSpec>,
}

/// Desired state of a pgAdmin installation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersManifest {
    pub target: PgAdminTarget,
    #[serde(default)]
    pub backoff: Option<BackoffSettings>,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub users: Vec<UserSpec>,
    /// Delete active logins missing from `users`.
    #[serde(default)]
    pub prune: bool,
}

impl UsersManifest {
    /// Parse and validate a manifest.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.namespace.is_empty() || self.target.pod.is_empty() {
            return Err(ConfigError::Invalid(
                "target namespace and pod must be set".to_string(),
            ));
        }
        if let Some(backoff) = &self.backoff {
            backoff.validate()?;
        }
        if self.separator.as_deref() == Some("") {
            return Err(ConfigError::Invalid("separator must not be empty".to_string()));
        }

        let mut seen = std::collections::BTreeSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                return Err(ConfigError::Invalid("username must not be empty".to_string()));
            }
            if !seen.insert(user.username.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate username {}",
                    user.username
                )));
            }
        }
        Ok(())
    }
}

/// Read a manifest from disk.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<UsersManifest, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    UsersManifest::from_json(&json)
}
