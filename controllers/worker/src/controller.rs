//! Main controller implementation.
//!
//! Wires the seed client, the reconciler and the Worker watcher together.

use std::sync::Arc;

use crds::Worker;
use kube::{Api, Client};
use seed_client::KubeSeedClient;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::{Context, watch_workers};

/// Main controller for vSphere Worker resources.
#[derive(Debug)]
pub struct Controller {
    worker_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching workers.
    pub async fn new(config: ControllerConfig, shutdown: CancellationToken) -> Result<Self, ControllerError> {
        info!("Initializing vSphere Worker Controller");

        let kube_client = Client::try_default().await?;
        let seed_client = KubeSeedClient::new(kube_client.clone());

        let reconciler = Reconciler::new(seed_client, config.profile, config.hash_policy);

        let worker_api: Api<Worker> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let ctx = Arc::new(Context::new(reconciler, kube_client, shutdown));
        let worker_watcher = tokio::spawn(watch_workers(worker_api, ctx));

        Ok(Self { worker_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("vSphere Worker Controller running");

        self.worker_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("Worker watcher panicked: {e}")))?
            .map_err(|e| ControllerError::Watch(format!("Worker watcher error: {e}")))
    }
}
