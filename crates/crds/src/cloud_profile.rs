//! Cloud profile types
//!
//! The cloud profile lists the machine types a cluster may use. The provider
//! specific part (`CloudProfileConfig`) adds the vSphere regions and the
//! template VM paths of every machine image version.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Provider independent part of the cloud profile
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileSpec {
    /// Machine types, searched in order
    #[serde(default)]
    pub machine_types: Vec<MachineType>,
}

/// A machine type offered by the cloud profile
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineType {
    /// Machine type name
    pub name: String,

    /// Number of CPUs (e.g., "2")
    #[schemars(with = "String")]
    pub cpu: Quantity,

    /// Memory size (e.g., "4Gi")
    #[schemars(with = "String")]
    pub memory: Quantity,

    /// Whether the machine type may be used for new pools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usable: Option<bool>,

    /// System disk of the machine type (defaults to 20 GB when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<MachineTypeStorage>,
}

/// System disk settings of a machine type
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineTypeStorage {
    /// Storage class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Disk size (e.g., "50Gi")
    #[schemars(with = "String")]
    pub storage_size: Quantity,

    /// Disk type
    #[serde(default, rename = "type")]
    pub type_: String,
}

/// vSphere specific part of the cloud profile
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileConfig {
    /// vSphere regions
    #[serde(default)]
    pub regions: Vec<RegionSpec>,

    /// Machine images with their template VM paths
    #[serde(default)]
    pub machine_images: Vec<MachineImages>,
}

/// A vSphere region (one vCenter)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegionSpec {
    /// Region name
    pub name: String,

    /// vCenter host name
    pub vsphere_host: String,

    /// Skip TLS verification when talking to the vCenter
    #[serde(default, rename = "vsphereInsecureSSL")]
    pub vsphere_insecure_ssl: bool,
}

/// All versions of one machine image
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineImages {
    /// Image name
    pub name: String,

    /// Image versions
    #[serde(default)]
    pub versions: Vec<MachineImageVersion>,
}

/// One version of a machine image
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageVersion {
    /// Image version
    pub version: String,

    /// Path of the template VM
    pub path: String,

    /// Guest OS identifier (e.g., "coreos64Guest")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
}

impl CloudProfileConfig {
    /// Find a region by name
    pub fn find_region(&self, name: &str) -> Option<&RegionSpec> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Find the version entry of a machine image
    pub fn find_machine_image(&self, name: &str, version: &str) -> Option<&MachineImageVersion> {
        self.machine_images
            .iter()
            .find(|image| image.name == name)
            .and_then(|image| image.versions.iter().find(|v| v.version == version))
    }
}

/// Everything the controller needs to know about the cluster besides the Worker itself
///
/// Loaded from a YAML file at startup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProfile {
    /// Cluster Kubernetes version (e.g., "1.30.2")
    pub kubernetes_version: String,

    /// Machine type catalog
    #[serde(default)]
    pub cloud_profile: CloudProfileSpec,

    /// vSphere regions and machine images
    #[serde(default)]
    pub provider_config: CloudProfileConfig,
}

impl ClusterProfile {
    /// Parse a cluster profile from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, ProfileError> {
        let profile: Self = serde_yaml::from_str(yaml)?;
        if profile.kubernetes_version.trim().is_empty() {
            return Err(ProfileError::Invalid("kubernetesVersion must not be empty".to_string()));
        }
        Ok(profile)
    }
}
