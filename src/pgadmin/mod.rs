//! pgAdmin login and server provisioning.
//!
//! Idempotent operations over pgAdmin's SQLite schema, implemented as
//! methods on [`QueryRunner`](crate::client::QueryRunner):
//!
//! - `logins`: ensure, delete and list login users
//! - `servers`: ensure a saved server connection for a login
//! - `sync`: converge a whole set of logins
//!
//! Every interpolated value goes through [`quote`]. Values come from
//! cluster configuration, so quoting keeps statements well formed rather
//! than defending against hostile input.

mod error;
mod logins;
mod servers;
mod sync;

use std::fmt;

pub use error::{AdminError, Result};

use crate::config::ServerSpec;

/// Server group every provisioned connection is filed under.
pub const SERVER_GROUP: &str = "Servers";

/// Role of pgAdmin administrators. Pruning never removes its members.
pub const ADMIN_ROLE: &str = "Administrator";

/// Role granted to provisioned logins.
pub const USER_ROLE: &str = "User";

/// Row id of the administrator created by pgAdmin setup.
pub const SETUP_USER_ID: i64 = 1;

/// Quote `value` as a SQL string literal, doubling single quotes.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A saved server connection in a login's object browser.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerEntry {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub maintenance_db: String,
    pub ssl_mode: String,
    pub comment: String,
    /// Plaintext connection password. Stored encrypted, never in clear.
    pub password: String,
}

impl ServerEntry {
    /// Build an entry from its manifest form and the resolved password.
    pub fn from_spec(spec: &ServerSpec, password: impl Into<String>) -> Self {
        Self {
            name: spec.name.clone(),
            host: spec.host.clone(),
            port: spec.port,
            maintenance_db: spec.maintenance_db.clone(),
            ssl_mode: spec.ssl_mode.clone(),
            comment: spec.comment.clone(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ServerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEntry")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("maintenance_db", &self.maintenance_db)
            .field("ssl_mode", &self.ssl_mode)
            .field("comment", &self.comment)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A login that should exist after [`sync_users`](crate::client::QueryRunner::sync_users).
#[derive(Clone, PartialEq, Eq)]
pub struct DesiredUser {
    pub username: String,
    pub password: String,
    pub server: Option<ServerEntry>,
}

impl fmt::Debug for DesiredUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesiredUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// Outcome of one sync.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Logins created or updated, in manifest order.
    pub ensured: Vec<String>,
    /// Logins removed because they were not desired.
    pub deleted: Vec<String>,
}
