//! SeedClient trait for mocking
//!
//! This trait abstracts seed cluster access so the worker controller can be
//! unit tested without a running cluster. `KubeSeedClient` implements it
//! against the Kubernetes API; tests use `MockSeedClient`.

use crds::{InfrastructureStatus, SecretReference};

use crate::error::SeedError;
use crate::models::Credentials;

/// Seed cluster operations needed by the worker controller
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait SeedClientTrait: Send + Sync {
    /// Read the vSphere credentials from the referenced secret.
    ///
    /// `default_namespace` is used when the reference carries no namespace.
    async fn get_credentials(
        &self,
        secret_ref: &SecretReference,
        default_namespace: &str,
    ) -> Result<Credentials, SeedError>;

    /// Decode the infrastructure provider status of a worker.
    async fn get_infrastructure_status(
        &self,
        namespace: &str,
        raw: Option<&serde_json::Value>,
    ) -> Result<InfrastructureStatus, SeedError>;

    /// Apply rendered machine classes (and their secrets) into `namespace`.
    ///
    /// Every element is one flat machine class record carrying at least
    /// `name` and `secret`.
    async fn apply_machine_classes(
        &self,
        namespace: &str,
        machine_classes: &[serde_json::Value],
    ) -> Result<(), SeedError>;
}
