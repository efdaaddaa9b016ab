//! pgadmin-provisioner - converge pgAdmin logins from a users manifest.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads the manifest named by the first argument or `PGADMIN_USERS_MANIFEST`
//! - Resolves login passwords from Secrets in the target namespace
//! - Syncs the logins into the pgAdmin pod and exits

use kube::Client;
use tracing::{error, info};

use pgadmin_provisioner::backoff::ExponentialBackoffPolicy;
use pgadmin_provisioner::client::{KubeExecutor, QueryRunner, secret_value};
use pgadmin_provisioner::config::{ConfigError, ENV_USERS_MANIFEST, UsersManifest, load_manifest};
use pgadmin_provisioner::pgadmin::{DesiredUser, ServerEntry};

#[tokio::main]
#[allow(clippy::exit)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pgadmin_provisioner=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting pgadmin-provisioner");

    if let Err(e) = run().await {
        error!(error = %e, "pgAdmin provisioning failed");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_USERS_MANIFEST).ok())
        .ok_or(ConfigError::MissingEnv(ENV_USERS_MANIFEST))?;
    let manifest = load_manifest(&path)?;
    info!(
        manifest = %path,
        namespace = %manifest.target.namespace,
        pod = %manifest.target.pod,
        users = manifest.users.len(),
        "Loaded users manifest"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let users = desired_users(client.clone(), &manifest).await?;

    let mut runner = QueryRunner::new(KubeExecutor::new(client), manifest.target.clone());
    if let Some(backoff) = manifest.backoff.clone() {
        runner = runner.with_backoff(ExponentialBackoffPolicy::from(backoff));
    }
    if let Some(separator) = manifest.separator.clone() {
        runner = runner.with_separator(separator);
    }

    let report = runner.sync_users(&users, manifest.prune).await?;
    info!(
        ensured = ?report.ensured,
        deleted = ?report.deleted,
        "pgAdmin provisioning complete"
    );
    Ok(())
}

/// Resolve each manifest user's password from its Secret.
async fn desired_users(
    client: Client,
    manifest: &UsersManifest,
) -> Result<Vec<DesiredUser>, Box<dyn std::error::Error>> {
    let mut users = Vec::with_capacity(manifest.users.len());
    for spec in &manifest.users {
        let password = secret_value(
            client.clone(),
            &manifest.target.namespace,
            &spec.password_secret.name,
            &spec.password_secret.key,
        )
        .await?;
        let server = spec
            .server
            .as_ref()
            .map(|server| ServerEntry::from_spec(server, password.clone()));
        users.push(DesiredUser {
            username: spec.username.clone(),
            password,
            server,
        });
    }
    Ok(users)
}
