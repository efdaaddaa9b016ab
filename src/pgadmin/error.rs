//! Error types for pgAdmin administration.
//!
//! Classifies failures so callers driven by a reconcile loop know whether
//! to try again.

use std::time::Duration;

use thiserror::Error;

use crate::client::QueryError;
use crate::crypto::CryptoError;

/// Error type for pgAdmin domain operations
#[derive(Error, Debug)]
pub enum AdminError {
    /// Remote query failed after all retries
    #[error("pgAdmin query error: {0}")]
    Query(#[from] QueryError),

    /// Encryption or hashing failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The login has not been created yet
    #[error("pgAdmin user not found: {0}")]
    UserNotFound(String),

    /// Query output did not have the expected shape
    #[error("Unexpected pgAdmin output: {0}")]
    Parse(String),
}

impl AdminError {
    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            AdminError::Query(QueryError::Crypto(_)) => false,
            AdminError::Query(_) => true,
            // Another reconcile may create the login first.
            AdminError::UserNotFound(_) => true,
            AdminError::Crypto(_) | AdminError::Parse(_) => false,
        }
    }

    /// Get the recommended requeue duration for this error
    pub fn requeue_after(&self) -> Duration {
        if self.is_retryable() {
            Duration::from_secs(30)
        } else {
            Duration::from_secs(3600)
        }
    }
}

/// Result type alias for pgAdmin operations
pub type Result<T> = std::result::Result<T, AdminError>;
