//! pgAdmin client module.
//!
//! Everything needed to talk to the SQLite database inside a pgAdmin pod.
//!
//! ## Architecture
//!
//! - `executor`: the [`Executor`] seam and its kube-rs implementation
//! - `runner`: [`QueryRunner`], retrying SQL with readiness and salt caching
//! - `secrets`: password lookup from Kubernetes Secrets
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgadmin_provisioner::client::{KubeExecutor, QueryRunner};
//! use pgadmin_provisioner::config::PgAdminTarget;
//!
//! let target = PgAdminTarget::new("postgres-operator", "hippo-pgadmin-0");
//! let mut runner = QueryRunner::new(KubeExecutor::new(client), target);
//! runner.ensure_ready().await?;
//! let users = runner.query("SELECT email FROM user").await?;
//! ```

pub mod executor;
pub mod runner;
pub mod secrets;

pub use executor::{ExecError, ExecOutput, Executor, KubeExecutor};
pub use runner::{MAX_ATTEMPTS, QueryError, QueryRunner};
pub use secrets::{SecretError, secret_value};
