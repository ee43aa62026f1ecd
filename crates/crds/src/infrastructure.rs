//! Infrastructure status
//!
//! Written by the infrastructure controller into the worker's
//! `infrastructureProviderStatus`. Carries the network segment and the
//! placement facts of every availability zone.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Decoded infrastructure provider status
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// vSphere placement configuration
    #[serde(default)]
    pub vsphere_config: VsphereConfig,

    /// NSX-T state (absent until the network has been created)
    #[serde(default, rename = "nsxtInfraState", skip_serializing_if = "Option::is_none")]
    pub nsxt_infra_state: Option<NsxtInfraState>,
}

/// vSphere placement configuration of a cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfig {
    /// VM folder
    #[serde(default)]
    pub folder: String,

    /// Region name
    #[serde(default)]
    pub region: String,

    /// Placement facts keyed by zone name
    #[serde(default)]
    pub zone_configs: BTreeMap<String, ZoneConfig>,
}

/// Placement facts of one availability zone
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneConfig {
    /// Datacenter name
    #[serde(default)]
    pub datacenter: String,

    /// Compute cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_cluster: Option<String>,

    /// Resource pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,

    /// Host system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_system: Option<String>,

    /// Datastore
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,

    /// Datastore cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore_cluster: Option<String>,

    /// Distributed switch UUID
    #[serde(default, rename = "switchUuid", skip_serializing_if = "Option::is_none")]
    pub switch_uuid: Option<String>,
}

/// NSX-T network state
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NsxtInfraState {
    /// Name of the network segment the machines are attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_name: Option<String>,

    /// NSX-T version the state was written by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl InfrastructureStatus {
    /// Network segment name, if the NSX-T state carries one
    pub fn segment_name(&self) -> Option<&str> {
        self.nsxt_infra_state
            .as_ref()
            .and_then(|state| state.segment_name.as_deref())
    }

    /// Placement facts of a zone
    pub fn zone_config(&self, zone: &str) -> Option<&ZoneConfig> {
        self.vsphere_config.zone_configs.get(zone)
    }
}
