//! CRD crate errors

use thiserror::Error;

/// Errors raised while loading a cluster profile
#[derive(Debug, Error)]
pub enum ProfileError {
    /// YAML could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Profile parsed but is not usable
    #[error("Invalid cluster profile: {0}")]
    Invalid(String),
}
