//! pgadmin-provisioner library crate
//!
//! Administers the SQLite database inside a pgAdmin pod through Kubernetes
//! exec: creates logins with pgAdmin-compatible password hashes, saves
//! server connections with its legacy CFB-8 password encryption, and
//! retries every remote call under a backoff policy.

pub mod backoff;
pub mod client;
pub mod config;
pub mod crypto;
pub mod pgadmin;

pub use client::{Executor, KubeExecutor, QueryRunner};
pub use config::{PgAdminTarget, UsersManifest};
pub use pgadmin::{AdminError, DesiredUser, ServerEntry, SyncReport};
