//! Seed client errors

use thiserror::Error;

/// Errors that can occur when reading from or writing to the seed cluster
#[derive(Debug, Error)]
pub enum SeedError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Referenced object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object exists but its content is unusable
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
