//! Reconciliation of Worker resources.
//!
//! Each reconciliation builds a fresh [`WorkerDelegate`], deploys the machine
//! classes and turns the generated machine deployments into the worker
//! status. Failed workers are retried with a per-resource Fibonacci backoff.


use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crds::{ClusterProfile, MachineDeploymentStatus, Worker, WorkerState, WorkerStatus};
use seed_client::SeedClientTrait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::{DEFAULT_MIN_DELAY, FibonacciBackoff};
use crate::error::ControllerError;
use crate::generator::WorkerDelegate;
use crate::generator::pool_hash::PoolHashPolicy;

/// Reconciles Worker resources.
pub struct Reconciler {
    pub(crate) seed_client: Box<dyn SeedClientTrait + Send + Sync>,
    pub(crate) profile: ClusterProfile,
    pub(crate) hash_policy: PoolHashPolicy,
    /// Backoff per worker (namespace/name -> backoff)
    backoff_states: Arc<Mutex<HashMap<String, FibonacciBackoff>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kubernetes_version", &self.profile.kubernetes_version)
            .field("hash_policy", &self.hash_policy)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        seed_client: impl SeedClientTrait + Send + Sync + 'static,
        profile: ClusterProfile,
        hash_policy: PoolHashPolicy,
    ) -> Self {
        Self {
            seed_client: Box::new(seed_client),
            profile,
            hash_policy,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Deploy the machine classes of `worker` and compute its new status
    ///
    /// Nothing is applied unless the whole configuration could be generated.
    pub async fn reconcile_worker(
        &self,
        worker: &Worker,
        cancel: &CancellationToken,
    ) -> Result<WorkerStatus, ControllerError> {
        let delegate = WorkerDelegate::new(self.seed_client.as_ref(), worker, &self.profile, &self.hash_policy);

        delegate.deploy_machine_classes(cancel).await?;
        let deployments = delegate.generate_machine_deployments(cancel).await?;
        let images = delegate.machine_images(cancel).await?;

        for deployment in deployments {
            debug!(
                "Machine deployment {} uses {} {}",
                deployment.name,
                delegate.machine_class_kind(),
                deployment.class_name
            );
        }

        Ok(WorkerStatus {
            machine_images: images.to_vec(),
            machine_deployments: deployments
                .iter()
                .map(|d| MachineDeploymentStatus {
                    name: d.name.clone(),
                    minimum: d.minimum,
                    maximum: d.maximum,
                })
                .collect(),
            state: WorkerState::Reconciled,
            error: None,
            last_reconciled: None,
        })
    }

    /// Status after a failed reconciliation
    ///
    /// Machine deployments and images of the last successful pass are kept.
    pub(crate) fn failed_status(previous: Option<&WorkerStatus>, error: &ControllerError) -> WorkerStatus {
        let mut status = previous.cloned().unwrap_or_default();
        status.state = WorkerState::Failed;
        status.error = Some(error.to_string());
        status
    }

    /// Whether `status` differs from the stored status (ignoring `lastReconciled`)
    pub(crate) fn status_needs_update(previous: Option<&WorkerStatus>, status: &WorkerStatus) -> bool {
        match previous {
            None => true,
            Some(previous) => {
                previous.state != status.state
                    || previous.error != status.error
                    || previous.machine_deployments != status.machine_deployments
                    || previous.machine_images != status.machine_images
            }
        }
    }

    /// Status patch with PascalCase state values
    ///
    /// `lastReconciled` is only written when the state changes.
    pub(crate) fn create_worker_status_patch(
        previous: Option<&WorkerStatus>,
        status: &WorkerStatus,
    ) -> Result<serde_json::Value, ControllerError> {
        let state_str = match status.state {
            WorkerState::Pending => "Pending",
            WorkerState::Reconciled => "Reconciled",
            WorkerState::Failed => "Failed",
        };
        let encode = |e: serde_json::Error| ControllerError::InvalidValue(format!("could not encode worker status: {e}"));

        let mut patch = serde_json::json!({
            "status": {
                "machineDeployments": serde_json::to_value(&status.machine_deployments).map_err(encode)?,
                "machineImages": serde_json::to_value(&status.machine_images).map_err(encode)?,
                "state": state_str,
                "error": status.error,
            }
        });

        if previous.is_none_or(|previous| previous.state != status.state) {
            patch["status"]["lastReconciled"] = serde_json::json!(chrono::Utc::now());
        }
        Ok(patch)
    }

    /// Delay before retrying a failed worker; advances its backoff
    pub fn next_backoff(&self, resource_key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let backoff = states.entry(resource_key.to_string()).or_default();
                let delay = backoff.next_delay();
                info!(
                    "Worker {} failed {} times in a row, retrying in {}s",
                    resource_key,
                    backoff.failures(),
                    delay.as_secs()
                );
                delay
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                DEFAULT_MIN_DELAY
            }
        }
    }

    /// Forget the failures of a worker (on successful reconciliation)
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock()
            && states.remove(resource_key).is_some()
        {
            debug!("Backoff of Worker {} cleared", resource_key);
        }
    }
}
