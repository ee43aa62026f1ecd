//! Machine configuration of one worker
//!
//! Expands every worker pool into one machine deployment and one machine
//! class per zone:
//! - `machine_type`: machine type catalog lookup
//! - `distribution`: per-zone share of the pool bounds
//! - `pool_hash`: configuration hash used in machine class names
//! - `machine_class`: typed machine class records and their builder
//!
//! A [`WorkerDelegate`] lives for one reconciliation. The first call that needs
//! the configuration generates it; later calls reuse the result.

pub mod distribution;
pub mod machine_class;
pub mod machine_type;
pub mod pool_hash;
pub mod quantity;

#[cfg(test)]
mod generator_test;

use std::collections::BTreeMap;
use std::future::Future;

use crds::{ClusterProfile, MachineImage, Worker, WorkerPool};
use k8s_openapi::api::core::v1::Taint;
use seed_client::client::MACHINE_CLASS_KIND;
use seed_client::{SeedClientTrait, SeedError};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ControllerError;
use distribution::{distribute_int_or_percent, distribute_over_zones, non_negative};
use machine_class::{MachineClass, MachineClassBuilder, MachineClassSecretData, PlacementField};
use machine_type::{MachineTypeCatalog, MachineTypeFacts};
use pool_hash::{PoolConfigHasher, PoolHashPolicy};

/// One zone-scoped slice of a worker pool
#[derive(Debug, Clone, PartialEq)]
pub struct MachineDeployment {
    /// `<namespace>-<pool>-z<zone index + 1>`
    pub name: String,
    /// `<deployment name>-<pool hash>`
    pub class_name: String,
    /// Secret of the machine class (same as the class name)
    pub secret_name: String,
    /// Minimum replicas in this zone
    pub minimum: i32,
    /// Maximum replicas in this zone
    pub maximum: i32,
    /// Rolling update surge in this zone
    pub max_surge: i32,
    /// Rolling update unavailability in this zone
    pub max_unavailable: i32,
    /// Node labels
    pub labels: BTreeMap<String, String>,
    /// Node annotations
    pub annotations: BTreeMap<String, String>,
    /// Node taints
    pub taints: Vec<Taint>,
}

/// Result of one generation pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeneratedConfig {
    /// Machine deployments in pool and zone order
    pub machine_deployments: Vec<MachineDeployment>,
    /// Machine classes, parallel to `machine_deployments`
    pub machine_classes: Vec<MachineClass>,
    /// Machine images used by the pools, first occurrence wins
    pub machine_images: Vec<MachineImage>,
}

/// Generates machine deployments and classes for one worker
pub struct WorkerDelegate<'a> {
    seed: &'a dyn SeedClientTrait,
    worker: &'a Worker,
    profile: &'a ClusterProfile,
    hash_policy: &'a PoolHashPolicy,
    generated: OnceCell<GeneratedConfig>,
}

impl std::fmt::Debug for WorkerDelegate<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerDelegate")
            .field("worker", &self.worker.metadata.name)
            .field("generated", &self.generated.initialized())
            .finish_non_exhaustive()
    }
}

impl<'a> WorkerDelegate<'a> {
    /// Create a delegate for one reconciliation of `worker`
    pub fn new(
        seed: &'a dyn SeedClientTrait,
        worker: &'a Worker,
        profile: &'a ClusterProfile,
        hash_policy: &'a PoolHashPolicy,
    ) -> Self {
        Self {
            seed,
            worker,
            profile,
            hash_policy,
            generated: OnceCell::new(),
        }
    }

    /// Kind of the machine class objects written by this delegate
    pub fn machine_class_kind(&self) -> &'static str {
        MACHINE_CLASS_KIND
    }

    /// Machine deployments of every (pool, zone) pair
    pub async fn generate_machine_deployments(
        &self,
        cancel: &CancellationToken,
    ) -> Result<&[MachineDeployment], ControllerError> {
        Ok(&self.generated(cancel).await?.machine_deployments)
    }

    /// Machine classes of every (pool, zone) pair
    pub async fn machine_classes(&self, cancel: &CancellationToken) -> Result<&[MachineClass], ControllerError> {
        Ok(&self.generated(cancel).await?.machine_classes)
    }

    /// Machine images referenced by the pools
    pub async fn machine_images(&self, cancel: &CancellationToken) -> Result<&[MachineImage], ControllerError> {
        Ok(&self.generated(cancel).await?.machine_images)
    }

    /// Apply every machine class and its secret to the seed
    pub async fn deploy_machine_classes(&self, cancel: &CancellationToken) -> Result<(), ControllerError> {
        let namespace = self.namespace()?;
        let classes = self
            .machine_classes(cancel)
            .await?
            .iter()
            .map(MachineClass::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        cancellable(
            cancel,
            "applying machine classes",
            self.seed.apply_machine_classes(namespace, &classes),
        )
        .await?;

        info!(
            "Deployed {} {} objects for worker {}",
            classes.len(),
            self.machine_class_kind(),
            namespace
        );
        Ok(())
    }

    async fn generated(&self, cancel: &CancellationToken) -> Result<&GeneratedConfig, ControllerError> {
        self.generated
            .get_or_try_init(|| self.generate_machine_config(cancel))
            .await
    }

    fn namespace(&self) -> Result<&'a str, ControllerError> {
        self.worker
            .metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| ControllerError::MissingConfiguration("worker has no namespace".to_string()))
    }

    async fn machine_class_secret_data(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<MachineClassSecretData, ControllerError> {
        let spec = &self.worker.spec;
        let credentials = cancellable(
            cancel,
            "reading cloud provider credentials",
            self.seed.get_credentials(&spec.secret_ref, namespace),
        )
        .await?;

        let Some(region) = self.profile.provider_config.find_region(&spec.region) else {
            error!("Region {} not found in cloud profile config", spec.region);
            return Err(ControllerError::NotFound(format!("region {}", spec.region)));
        };

        Ok(MachineClassSecretData {
            host: region.vsphere_host.clone(),
            username: credentials.username,
            password: credentials.password,
            insecure_ssl: region.vsphere_insecure_ssl,
        })
    }

    /// Resolve the template VM of a pool's image
    ///
    /// Images dropped from the cloud profile are still found in the worker
    /// status as long as machines use them.
    fn resolve_machine_image(&self, pool: &WorkerPool) -> Result<MachineImage, ControllerError> {
        let name = &pool.machine_image.name;
        let version = &pool.machine_image.version;

        if let Some(found) = self.profile.provider_config.find_machine_image(name, version) {
            return Ok(MachineImage {
                name: name.clone(),
                version: version.clone(),
                path: found.path.clone(),
                guest_id: found.guest_id.clone(),
            });
        }

        let in_use = self
            .worker
            .status
            .as_ref()
            .and_then(|status| status.machine_images.iter().find(|image| image.matches(name, version)));
        match in_use {
            Some(image) => Ok(image.clone()),
            None => {
                error!("Machine image {}/{} not found", name, version);
                Err(ControllerError::NotFound(format!("machine image {name} version {version}")))
            }
        }
    }

    async fn generate_machine_config(&self, cancel: &CancellationToken) -> Result<GeneratedConfig, ControllerError> {
        let namespace = self.namespace()?;
        let spec = &self.worker.spec;

        let secret_data = self.machine_class_secret_data(namespace, cancel).await?;

        let infrastructure = cancellable(
            cancel,
            "reading infrastructure status",
            self.seed
                .get_infrastructure_status(namespace, spec.infrastructure_provider_status.as_ref()),
        )
        .await?;

        let Some(network) = infrastructure.segment_name().filter(|name| !name.is_empty()) else {
            error!("Worker {} has no network segment", namespace);
            return Err(ControllerError::MissingConfiguration(
                "SegmentName not set in nsxtInfraState".to_string(),
            ));
        };

        let ssh_key = String::from_utf8(spec.ssh_public_key.0.clone())
            .map_err(|e| ControllerError::InvalidValue(format!("sshPublicKey is not valid UTF-8: {e}")))?;
        if ssh_key.trim().is_empty() {
            error!("Worker {} has no SSH public key", namespace);
            return Err(ControllerError::MissingConfiguration("missing sshPublicKey".to_string()));
        }

        let catalog = MachineTypeCatalog::new(&self.profile.cloud_profile.machine_types);
        let hasher = PoolConfigHasher::new(self.hash_policy, &self.profile.kubernetes_version);
        let mut machine_types: BTreeMap<&str, MachineTypeFacts> = BTreeMap::new();
        let mut generated = GeneratedConfig::default();

        for pool in &spec.pools {
            let image = self.resolve_machine_image(pool)?;
            if !generated
                .machine_images
                .iter()
                .any(|known| known.matches(&image.name, &image.version))
            {
                generated.machine_images.push(image.clone());
            }

            let facts = match machine_types.get(pool.machine_type.as_str()) {
                Some(facts) => *facts,
                None => {
                    let facts = catalog
                        .lookup(&pool.machine_type)
                        .map_err(|e| e.context(format!("extracting machine values for pool {}", pool.name)))?;
                    machine_types.insert(&pool.machine_type, facts);
                    facts
                }
            };

            let hash = hasher
                .hash(pool)
                .map_err(|e| e.context(format!("hashing pool {}", pool.name)))?;
            let user_data = String::from_utf8(pool.user_data.0.clone()).map_err(|e| {
                ControllerError::InvalidValue(format!("user data of pool {} is not valid UTF-8: {e}", pool.name))
            })?;
            let minimum = non_negative("minimum", pool.minimum)
                .map_err(|e| e.context(format!("bounds of pool {}", pool.name)))?;
            let maximum = non_negative("maximum", pool.maximum)
                .map_err(|e| e.context(format!("bounds of pool {}", pool.name)))?;
            let zone_count = i32::try_from(pool.zones.len())
                .map_err(|e| ControllerError::InvalidValue(format!("pool {} has too many zones: {e}", pool.name)))?;

            for (zone_index, zone) in (0..zone_count).zip(&pool.zones) {
                let Some(zone_config) = infrastructure.zone_config(zone) else {
                    error!("Zone {} of pool {} has no zone config", zone, pool.name);
                    return Err(ControllerError::NotFound(format!("zoneConfig not found for zone {zone}")));
                };

                let deployment_name = format!("{namespace}-{}-z{}", pool.name, zone_index + 1);
                let class_name = format!("{deployment_name}-{hash}");

                let class = MachineClassBuilder::new(&class_name)
                    .region(&infrastructure.vsphere_config.region)
                    .ssh_key(&ssh_key)
                    .cluster_namespace(namespace)
                    .network(network)
                    .placement(PlacementField::Folder, &infrastructure.vsphere_config.folder)
                    .zone(zone_config)
                    .image(&image)
                    .machine(facts)
                    .user_data(&user_data)
                    .credentials(&secret_data)
                    .build()
                    .map_err(|e| e.context(format!("building machine class {class_name}")))?;

                let deployment = MachineDeployment {
                    minimum: distribute_over_zones(zone_index, minimum, zone_count),
                    maximum: distribute_over_zones(zone_index, maximum, zone_count),
                    max_surge: distribute_int_or_percent(zone_index, &pool.max_surge, zone_count, maximum)
                        .map_err(|e| e.context(format!("maxSurge of pool {}", pool.name)))?,
                    max_unavailable: distribute_int_or_percent(
                        zone_index,
                        &pool.max_unavailable,
                        zone_count,
                        minimum,
                    )
                    .map_err(|e| e.context(format!("maxUnavailable of pool {}", pool.name)))?,
                    name: deployment_name,
                    secret_name: class_name.clone(),
                    class_name,
                    labels: pool.labels.clone(),
                    annotations: pool.annotations.clone(),
                    taints: pool.taints.clone(),
                };

                debug!(
                    "Pool {} zone {}: deployment {} class {} (min {}, max {})",
                    pool.name, zone, deployment.name, deployment.class_name, deployment.minimum, deployment.maximum
                );
                generated.machine_deployments.push(deployment);
                generated.machine_classes.push(class);
            }
        }

        info!(
            "Generated {} machine deployments from {} pools for worker {}",
            generated.machine_deployments.len(),
            spec.pools.len(),
            namespace
        );
        Ok(generated)
    }
}

/// Run a seed lookup unless `cancel` fires first
async fn cancellable<T>(
    cancel: &CancellationToken,
    step: &str,
    lookup: impl Future<Output = Result<T, SeedError>>,
) -> Result<T, ControllerError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            warn!("{} cancelled", step);
            Err(ControllerError::Cancelled(step.to_string()))
        }
        result = lookup => result.map_err(|e| {
            error!("{} failed: {}", step, e);
            ControllerError::from(e).context(step)
        }),
    }
}
