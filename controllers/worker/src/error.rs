//! Controller-specific error types.
//!
//! Every failure of a generation pass is fatal to that pass. Errors may be
//! wrapped with the failing step via [`ControllerError::context`]; callers that
//! need to branch on the failure use [`ControllerError::kind`], which looks
//! through any number of context layers.

use kube::Error as KubeError;
use seed_client::SeedError;
use thiserror::Error;

/// Errors that can occur in the worker controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Referenced machine type, machine image, region or zone config is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or non-positive value (resource quantity, percentage, version)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Required top-level field is absent (network segment, SSH key)
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// Credential or infrastructure status lookup failed
    #[error("Upstream failure: {0}")]
    UpstreamFailure(#[from] SeedError),

    /// A lookup was cancelled
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid process configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// An error raised while performing `step`
    #[error("{step}: {source}")]
    Context {
        /// Step that failed
        step: String,
        /// Underlying error
        #[source]
        source: Box<ControllerError>,
    },
}

/// Coarse classification of a [`ControllerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`ControllerError::NotFound`]
    NotFound,
    /// See [`ControllerError::InvalidValue`]
    InvalidValue,
    /// See [`ControllerError::MissingConfiguration`]
    MissingConfiguration,
    /// See [`ControllerError::UpstreamFailure`]
    UpstreamFailure,
    /// See [`ControllerError::Cancelled`]
    Cancelled,
    /// See [`ControllerError::Kube`]
    Kube,
    /// See [`ControllerError::InvalidConfig`]
    InvalidConfig,
    /// See [`ControllerError::Watch`]
    Watch,
}

impl ControllerError {
    /// Wrap this error with the step that failed
    #[must_use]
    pub fn context(self, step: impl Into<String>) -> Self {
        Self::Context {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Kind of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidValue(_) => ErrorKind::InvalidValue,
            Self::MissingConfiguration(_) => ErrorKind::MissingConfiguration,
            Self::UpstreamFailure(_) => ErrorKind::UpstreamFailure,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Kube(_) => ErrorKind::Kube,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Watch(_) => ErrorKind::Watch,
            Self::Context { source, .. } => source.kind(),
        }
    }
}
