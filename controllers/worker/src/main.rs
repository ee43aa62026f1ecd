//! vSphere Worker Controller
//!
//! Expands the worker pools of a `Worker` into one machine deployment per
//! availability zone, server-side applies the matching vSphere machine classes
//! and their credential secrets, and reports the deployments in the worker
//! status.

mod backoff;
mod config;
mod controller;
mod error;
mod generator;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;

use anyhow::Result;
use config::ControllerConfig;
use controller::Controller;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting vSphere Worker Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Cluster profile: {}", config.profile_path);
    info!("  Kubernetes version: {}", config.profile.kubernetes_version);
    info!(
        "  Hash annotation keys: {:?}",
        config.hash_policy.annotation_keys.iter().collect::<Vec<_>>()
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Shutdown signal received, cancelling in-flight reconciliations");
            shutdown.cancel();
        });
    }

    let controller = Controller::new(config, shutdown).await?;
    controller.run().await?;

    info!("vSphere Worker Controller stopped");
    Ok(())
}
