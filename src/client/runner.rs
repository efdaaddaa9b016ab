//! Retrying SQL runner for the pgAdmin SQLite database.
//!
//! pgAdmin keeps its users and saved servers in a single SQLite file inside
//! its pod. The operator can only reach that file by running `sqlite3` in
//! the container, and every such call can fail for transient reasons: the
//! pod is not scheduled yet, the container is restarting, pgAdmin has not
//! created its schema, or the database is locked by the web process.
//!
//! [`QueryRunner`] retries each call up to [`MAX_ATTEMPTS`] times, sleeping
//! according to its [`BackoffPolicy`] between attempts. It is a single-owner
//! session: operations take `&mut self`, and callers that need to share one
//! across tasks must wrap it in a mutex themselves.
//!
//! Two pieces of state are cached for the lifetime of the runner and never
//! revalidated:
//!
//! - readiness: once the probe succeeds it is not run again, even if the pod
//!   later restarts with an empty volume
//! - the installation's `SECURITY_PASSWORD_SALT`, fetched on first use

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::backoff::{BackoffPolicy, ExponentialBackoffPolicy};
use crate::client::executor::{ExecError, ExecOutput, Executor};
use crate::config::{DEFAULT_SEPARATOR, PgAdminTarget};
use crate::crypto::{CryptoError, hash_password};

/// Attempts made for each probe, statement or query.
pub const MAX_ATTEMPTS: i32 = 10;

/// Succeeds once pgAdmin has created its schema and the setup user.
const READINESS_PROBE: &str = "SELECT email FROM user WHERE id=1";

const SECURITY_SALT_QUERY: &str =
    "SELECT value FROM keys WHERE name = 'SECURITY_PASSWORD_SALT'";

/// Errors returned by [`QueryRunner`].
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("pgAdmin database not ready after {attempts} attempts: {source}")]
    NotReady {
        attempts: i32,
        #[source]
        source: ExecError,
    },

    #[error("pgAdmin command failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: i32,
        #[source]
        source: ExecError,
    },

    #[error("pgAdmin security salt is not set")]
    MissingSalt,

    #[error("Password hashing failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// SQL session against one pgAdmin pod.
pub struct QueryRunner<E> {
    target: PgAdminTarget,
    separator: String,
    security_salt: Option<String>,
    ready: bool,
    executor: E,
    backoff: Box<dyn BackoffPolicy>,
}

impl<E: Executor> QueryRunner<E> {
    /// Create a runner with the default separator and backoff policy.
    pub fn new(executor: E, target: PgAdminTarget) -> Self {
        Self {
            target,
            separator: DEFAULT_SEPARATOR.to_string(),
            security_salt: None,
            ready: false,
            executor,
            backoff: Box::new(ExponentialBackoffPolicy::default()),
        }
    }

    /// Replace the backoff policy.
    pub fn with_backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    /// Replace the field separator used by [`query`](Self::query).
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Field separator for multi-column query results.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn target(&self) -> &PgAdminTarget {
        &self.target
    }

    /// Whether the readiness probe has succeeded.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Wait for pgAdmin to create its database.
    ///
    /// The probe must exit cleanly, write nothing to stderr and return the
    /// setup user's email. A missing table is expected while pgAdmin starts
    /// and is retried quietly.
    #[instrument(skip(self), fields(pod = %self.target.pod))]
    pub async fn ensure_ready(&mut self) -> Result<(), QueryError> {
        if self.ready {
            return Ok(());
        }

        let command = self.command(READINESS_PROBE, false);
        self.with_retries("readiness probe", &command, |output| {
            if !output.stderr.trim().is_empty() {
                Err(ExecError::Stderr(output.stderr.trim().to_string()))
            } else if output.stdout.trim().is_empty() {
                Err(ExecError::NoOutput)
            } else {
                Ok(())
            }
        })
        .await
        .map_err(|(attempts, source)| QueryError::NotReady { attempts, source })?;

        debug!("pgAdmin database is ready");
        self.ready = true;
        Ok(())
    }

    /// Run a statement that returns nothing. Any stderr output fails the
    /// attempt.
    #[instrument(skip_all, fields(pod = %self.target.pod))]
    pub async fn exec(&mut self, sql: &str) -> Result<(), QueryError> {
        self.ensure_ready().await?;

        let command = self.command(sql, false);
        self.with_retries("exec", &command, |output| {
            if output.stderr.trim().is_empty() {
                Ok(())
            } else {
                Err(ExecError::Stderr(output.stderr.trim().to_string()))
            }
        })
        .await
        .map_err(|(attempts, source)| QueryError::Exhausted { attempts, source })
    }

    /// Run a query and return its trimmed output, one row per line with
    /// columns joined by [`separator`](Self::separator).
    ///
    /// Only a failed command fails an attempt; stderr is ignored here.
    #[instrument(skip_all, fields(pod = %self.target.pod))]
    pub async fn query(&mut self, sql: &str) -> Result<String, QueryError> {
        self.ensure_ready().await?;

        let command = self.command(sql, true);
        self.with_retries("query", &command, |output| {
            Ok(output.stdout.trim().to_string())
        })
        .await
        .map_err(|(attempts, source)| QueryError::Exhausted { attempts, source })
    }

    /// Hash a login password with this installation's security salt.
    ///
    /// The salt is read once and reused for every later hash.
    pub async fn password_hash(&mut self, password: &str) -> Result<String, QueryError> {
        if let Some(salt) = &self.security_salt {
            return Ok(hash_password(password, salt)?);
        }

        let salt = self.query(SECURITY_SALT_QUERY).await?;
        if salt.is_empty() {
            return Err(QueryError::MissingSalt);
        }
        debug!(pod = %self.target.pod, "Cached pgAdmin security salt");
        let hash = hash_password(password, &salt)?;
        self.security_salt = Some(salt);
        Ok(hash)
    }

    fn command(&self, sql: &str, with_separator: bool) -> Vec<String> {
        let mut command = vec!["sqlite3".to_string()];
        if with_separator {
            command.push("-separator".to_string());
            command.push(self.separator.clone());
        }
        command.push(self.target.database_path.clone());
        command.push(sql.to_string());
        command
    }

    /// Run `command` until `check` accepts its output or attempts run out.
    ///
    /// Returns the attempt count and last error on failure. There is no
    /// sleep after the final attempt.
    async fn with_retries<T, F>(
        &self,
        operation: &'static str,
        command: &[String],
        mut check: F,
    ) -> Result<T, (i32, ExecError)>
    where
        F: FnMut(ExecOutput) -> Result<T, ExecError> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            let result = self
                .executor
                .exec(
                    &self.target.namespace,
                    &self.target.pod,
                    &self.target.container,
                    command,
                    None,
                )
                .await
                .and_then(&mut check);

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempt += 1;

            if error.is_missing_table() {
                debug!(attempt, operation, "pgAdmin schema not created yet");
            } else {
                warn!(attempt, operation, error = %error, "pgAdmin command failed");
            }

            if attempt >= MAX_ATTEMPTS {
                return Err((attempt, error));
            }
            tokio::time::sleep(self.backoff.duration(attempt - 1)).await;
        }
    }
}
