//! Kubernetes resource watcher.
//!
//! Watches Worker resources with `kube_runtime::Controller` and reconciles
//! every change. Successful workers are resynced periodically; failed workers
//! are requeued with the reconciler's Fibonacci backoff.

use std::sync::Arc;
use std::time::Duration;

use crds::Worker;
use futures::StreamExt;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ControllerError, ErrorKind};
use crate::reconciler::Reconciler;

/// Resync interval of successfully reconciled workers
const RESYNC_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Shared state of the reconcile loop
pub struct Context {
    reconciler: Reconciler,
    client: Client,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("reconciler", &self.reconciler)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates the reconcile loop state
    pub fn new(reconciler: Reconciler, client: Client, shutdown: CancellationToken) -> Self {
        Self {
            reconciler,
            client,
            shutdown,
        }
    }
}

fn resource_key(worker: &Worker) -> Result<(String, String), ControllerError> {
    let name = worker
        .metadata
        .name
        .clone()
        .ok_or_else(|| ControllerError::InvalidConfig("Worker missing name".to_string()))?;
    let namespace = worker
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| ControllerError::InvalidConfig(format!("Worker {name} missing namespace")))?;
    Ok((namespace, name))
}

async fn patch_status(
    api: &Api<Worker>,
    name: &str,
    status_patch: &serde_json::Value,
) -> Result<(), ControllerError> {
    let pp = PatchParams::default();
    api.patch_status(name, &pp, &Patch::Merge(status_patch)).await?;
    Ok(())
}

async fn reconcile(worker: Arc<Worker>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let (namespace, name) = resource_key(&worker)?;
    let key = format!("{namespace}/{name}");
    let api: Api<Worker> = Api::namespaced(ctx.client.clone(), &namespace);
    let previous = worker.status.as_ref();

    debug!("Reconciling Worker {}", key);

    match ctx.reconciler.reconcile_worker(&worker, &ctx.shutdown).await {
        Ok(status) => {
            ctx.reconciler.reset_backoff(&key);
            if Reconciler::status_needs_update(previous, &status) {
                let patch = Reconciler::create_worker_status_patch(previous, &status)?;
                patch_status(&api, &name, &patch).await?;
                info!(
                    "Worker {} reconciled: {} machine deployments",
                    key,
                    status.machine_deployments.len()
                );
            }
            Ok(Action::requeue(RESYNC_INTERVAL))
        }
        Err(e) if e.kind() == ErrorKind::Cancelled => {
            info!("Reconciliation of Worker {} cancelled", key);
            Ok(Action::await_change())
        }
        Err(e) => {
            let status = Reconciler::failed_status(previous, &e);
            if Reconciler::status_needs_update(previous, &status) {
                match Reconciler::create_worker_status_patch(previous, &status) {
                    Ok(patch) => {
                        if let Err(patch_err) = patch_status(&api, &name, &patch).await {
                            error!("Failed to update error status of Worker {}: {}", key, patch_err);
                        }
                    }
                    Err(patch_err) => error!("Failed to build error status of Worker {}: {}", key, patch_err),
                }
            }
            Err(e)
        }
    }
}

fn error_policy(worker: Arc<Worker>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = match resource_key(&worker) {
        Ok((namespace, name)) => format!("{namespace}/{name}"),
        Err(_) => "<unknown>".to_string(),
    };
    warn!("Reconciliation error for Worker {}: {}", key, error);
    Action::requeue(ctx.reconciler.next_backoff(&key))
}

/// Watch Worker resources until `ctx.shutdown` is cancelled.
pub async fn watch_workers(api: Api<Worker>, ctx: Arc<Context>) -> Result<(), ControllerError> {
    info!("Starting Worker watcher");

    // Debounce batches bursts of events for the same worker
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);
    let shutdown = ctx.shutdown.clone();

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, ctx)
        .take_until(shutdown.cancelled_owned())
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled Worker {}", obj.name),
                Err(e) => error!("Controller error for Worker: {}", e),
            }
        })
        .await;

    info!("Worker watcher stopped");
    Ok(())
}
