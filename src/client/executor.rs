//! Remote command execution inside pgAdmin pods.
//!
//! [`Executor`] is the seam between the query runner and Kubernetes: it runs
//! one command in one container and hands back stdout and stderr.
//! [`KubeExecutor`] implements it with kube-rs native exec over websockets,
//! so the operator needs no `kubectl` binary.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::AttachParams;
use kube::{Api, Client};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Marker sqlite3 prints when a table has not been created yet.
const MISSING_TABLE: &str = "no such table";

/// Errors from a single remote command.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed ({reason}): {stderr}")]
    Failed { reason: String, stderr: String },

    #[error("Command wrote to stderr: {0}")]
    Stderr(String),

    #[error("Command produced no output")]
    NoOutput,

    #[error("Exec stream join error: {0}")]
    Join(String),
}

impl ExecError {
    /// Captured stderr, when the command got far enough to produce any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::Failed { stderr, .. } | ExecError::Stderr(stderr) => Some(stderr),
            _ => None,
        }
    }

    /// Whether sqlite3 reported a missing table, meaning pgAdmin has not
    /// finished creating its schema.
    pub fn is_missing_table(&self) -> bool {
        self.stderr().is_some_and(|s| s.contains(MISSING_TABLE))
    }
}

/// Output of a command that ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs a command inside a container.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `command` in `container` of `pod`, optionally feeding `stdin`.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
        stdin: Option<&str>,
    ) -> Result<ExecOutput, ExecError>;
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for Arc<T> {
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
        stdin: Option<&str>,
    ) -> Result<ExecOutput, ExecError> {
        (**self)
            .exec(namespace, pod, container, command, stdin)
            .await
    }
}

/// [`Executor`] backed by the Kubernetes pod exec subresource.
#[derive(Clone)]
pub struct KubeExecutor {
    client: Client,
}

impl KubeExecutor {
    /// Create an executor using the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Executor for KubeExecutor {
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
        stdin: Option<&str>,
    ) -> Result<ExecOutput, ExecError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default()
            .container(container)
            .stdin(stdin.is_some())
            .stdout(true)
            .stderr(true);

        tracing::trace!(namespace, pod, container, program = ?command.first(), "Exec in pod");

        let mut attached = pods.exec(pod, command.to_vec(), &params).await?;

        if let Some(input) = stdin
            && let Some(mut writer) = attached.stdin()
        {
            writer.write_all(input.as_bytes()).await?;
            writer.shutdown().await?;
        }

        let status = attached.take_status();
        let (stdout, stderr) = tokio::try_join!(
            read_all(attached.stdout()),
            read_all(attached.stderr())
        )?;
        let status = match status {
            Some(status) => status.await,
            None => None,
        };

        attached
            .join()
            .await
            .map_err(|e| ExecError::Join(e.to_string()))?;

        if let Some(status) = status
            && status.status.as_deref() == Some("Failure")
        {
            let reason = status
                .message
                .or(status.reason)
                .unwrap_or_else(|| "unknown failure".to_string());
            return Err(ExecError::Failed {
                reason,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(ExecOutput { stdout, stderr })
    }
}

/// Drain an optional exec stream into a string.
async fn read_all<R>(reader: Option<R>) -> Result<String, std::io::Error>
where
    R: AsyncRead + Unpin,
{
    let mut buf = String::new();
    if let Some(mut reader) = reader {
        reader.read_to_string(&mut buf).await?;
    }
    Ok(buf)
}
