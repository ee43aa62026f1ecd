//! Worker CRD
//!
//! Describes the worker pools of one cluster. The worker controller expands
//! every pool into per-zone machine deployments and machine classes.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Taint;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::machine_image::MachineImage;
use crate::references::SecretReference;

/// WorkerSpec defines the desired worker pools of a cluster
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Worker",
    namespaced,
    status = "WorkerStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSpec {
    /// Region of the cluster (must exist in the provider cloud profile config)
    pub region: String,

    /// Reference to the secret holding the cloud provider credentials
    pub secret_ref: SecretReference,

    /// Raw provider status of the infrastructure (decoded into `InfrastructureStatus`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<serde_json::Value>")]
    pub infrastructure_provider_status: Option<serde_json::Value>,

    /// Public SSH key installed on every machine
    #[serde(default)]
    #[schemars(with = "String")]
    pub ssh_public_key: ByteString,

    /// Worker pools, processed in order
    #[serde(default)]
    pub pools: Vec<WorkerPool>,
}

/// A named group of machines sharing machine type, image and scaling policy
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPool {
    /// Pool name (part of every machine deployment name)
    pub name: String,

    /// Machine type name (looked up in the cloud profile)
    pub machine_type: String,

    /// Machine image name and version
    pub machine_image: MachineImageRef,

    /// Availability zones spanned by the pool, in order
    #[serde(default)]
    pub zones: Vec<String>,

    /// Minimum number of machines across all zones
    pub minimum: i32,

    /// Maximum number of machines across all zones
    pub maximum: i32,

    /// Rolling update surge (absolute or percentage of `maximum`)
    #[serde(default = "default_max_surge")]
    #[schemars(with = "serde_json::Value")]
    pub max_surge: IntOrString,

    /// Rolling update unavailability (absolute or percentage of `minimum`)
    #[serde(default = "default_max_unavailable")]
    #[schemars(with = "serde_json::Value")]
    pub max_unavailable: IntOrString,

    /// Labels propagated to the nodes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations propagated to the nodes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Taints propagated to the nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Vec<serde_json::Value>")]
    pub taints: Vec<Taint>,

    /// Bootstrap user data handed to every machine
    #[serde(default)]
    #[schemars(with = "String")]
    pub user_data: ByteString,

    /// Root volume of the machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,

    /// Kubernetes version override for this pool (defaults to the cluster version)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
}

fn default_max_surge() -> IntOrString {
    IntOrString::Int(1)
}

fn default_max_unavailable() -> IntOrString {
    IntOrString::Int(0)
}

/// Machine image reference of a worker pool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageRef {
    /// Image name (e.g., "flatcar")
    pub name: String,

    /// Image version (e.g., "3139.2.3")
    pub version: String,
}

/// Root volume of a worker pool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume size (e.g., "50Gi")
    pub size: String,

    /// Volume type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// WorkerStatus defines the observed state of a worker
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    /// Machine images referenced by the pools (deduplicated by name and version)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_images: Vec<MachineImage>,

    /// Machine deployments generated in the last successful reconciliation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_deployments: Vec<MachineDeploymentStatus>,

    /// Current state of the worker
    #[serde(default)]
    pub state: WorkerState,

    /// Error message if reconciliation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Last time the state changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,
}

/// Replica bounds of one generated machine deployment
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentStatus {
    /// Machine deployment name
    pub name: String,

    /// Minimum replicas in this zone
    pub minimum: i32,

    /// Maximum replicas in this zone
    pub maximum: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Worker reconciliation state
///
/// Serializes as PascalCase but also accepts lowercase values.
#[serde(rename_all = "PascalCase")]
pub enum WorkerState {
    /// Not yet reconciled
    #[default]
    #[serde(alias = "pending")]
    Pending,

    /// Machine classes applied, deployments generated
    #[serde(alias = "reconciled")]
    Reconciled,

    /// Last reconciliation failed
    #[serde(alias = "failed")]
    Failed,
}
