//! Password lookup from Kubernetes Secrets.

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use thiserror::Error;

/// Errors that can occur while reading a password from a Secret.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Secret {name} has no key {key}")]
    MissingKey { name: String, key: String },

    #[error("Secret value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Fetch `key` from the Secret `name` in `namespace`.
pub async fn secret_value(
    client: Client,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String, SecretError> {
    let secrets: Api<Secret> = Api::namespaced(client, namespace);
    let secret = secrets.get(name).await?;
    value_from_secret(&secret, name, key)
}

/// Extract `key` from a Secret, preferring `data` over `stringData`.
///
/// The API server folds `stringData` into `data` on write, so Secrets read
/// back by [`secret_value`] only ever carry `data`. The `stringData` lookup
/// serves Secrets built locally, before they are applied.
pub fn value_from_secret(secret: &Secret, name: &str, key: &str) -> Result<String, SecretError> {
    if let Some(value) = secret.data.as_ref().and_then(|data| data.get(key)) {
        return Ok(String::from_utf8(value.0.clone())?);
    }

    secret
        .string_data
        .as_ref()
        .and_then(|data| data.get(key))
        .cloned()
        .ok_or_else(|| SecretError::MissingKey {
            name: name.to_string(),
            key: key.to_string(),
        })
}
