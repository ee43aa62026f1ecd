//! vSphere machine class records
//!
//! A [`MachineClass`] is the flat provider spec of one (pool, zone) pair. It is
//! assembled with [`MachineClassBuilder`] and only turned into an untyped JSON
//! value when handed to the seed client.

use std::collections::BTreeMap;

use crds::{MachineImage, ZoneConfig};
use serde::Serialize;
use serde_json::Value;

use super::machine_type::MachineTypeFacts;
use crate::error::ControllerError;

/// Tag carrying the cluster namespace
pub const CLUSTER_TAG: &str = "mcm.gardener.cloud/cluster";
/// Tag carrying the machine role
pub const ROLE_TAG: &str = "mcm.gardener.cloud/role";
/// Role of every worker machine
pub const ROLE_NODE: &str = "node";
/// Secret key holding the bootstrap user data
pub const USER_DATA_KEY: &str = "cloudConfig";

/// Credential entries of a machine class secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CredentialKey {
    /// vCenter host
    Host,
    /// vSphere user name
    Username,
    /// vSphere password
    Password,
    /// Skip TLS verification
    InsecureSsl,
}

impl CredentialKey {
    /// Secret key of this entry
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "vsphereHost",
            Self::Username => "vsphereUsername",
            Self::Password => "vspherePassword",
            Self::InsecureSsl => "vsphereInsecureSSL",
        }
    }
}

/// Credentials written into every machine class secret
#[derive(Clone, PartialEq, Eq)]
pub struct MachineClassSecretData {
    /// vCenter host of the worker's region
    pub host: String,
    /// vSphere user name
    pub username: String,
    /// vSphere password
    pub password: String,
    /// Skip TLS verification
    pub insecure_ssl: bool,
}

impl MachineClassSecretData {
    /// Secret entries in key order
    pub fn entries(&self) -> [(CredentialKey, String); 4] {
        [
            (CredentialKey::Host, self.host.clone()),
            (CredentialKey::Username, self.username.clone()),
            (CredentialKey::Password, self.password.clone()),
            (CredentialKey::InsecureSsl, self.insecure_ssl.to_string()),
        ]
    }
}

impl std::fmt::Debug for MachineClassSecretData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineClassSecretData")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure_ssl", &self.insecure_ssl)
            .finish()
    }
}

/// Placement constraints that are only written when set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlacementField {
    /// VM folder
    Folder,
    /// Guest OS identifier
    GuestId,
    /// Host system
    HostSystem,
    /// Resource pool
    ResourcePool,
    /// Compute cluster
    ComputeCluster,
    /// Datastore
    Datastore,
    /// Datastore cluster
    DatastoreCluster,
    /// Distributed switch UUID
    SwitchUuid,
}

/// System disk of a machine class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemDisk {
    /// Size in GB
    pub size: i64,
}

/// Provider spec of one (pool, zone) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineClass {
    /// Class name, also the name of its secret
    pub name: String,
    /// vSphere region
    pub region: String,
    /// Public SSH keys (always exactly one)
    pub ssh_keys: Vec<String>,
    /// Datacenter of the zone
    pub datacenter: String,
    /// Network segment
    pub network: String,
    /// Template VM path of the machine image
    #[serde(rename = "templateVM")]
    pub template_vm: String,
    /// Number of CPUs
    pub num_cpus: i64,
    /// Memory in MB
    pub memory: i64,
    /// System disk
    pub system_disk: SystemDisk,
    /// Ownership tags
    pub tags: BTreeMap<String, String>,
    /// Secret data: user data plus credentials
    pub secret: BTreeMap<String, String>,
    /// VM folder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Guest OS identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
    /// Host system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_system: Option<String>,
    /// Resource pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,
    /// Compute cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_cluster: Option<String>,
    /// Datastore
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
    /// Datastore cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastore_cluster: Option<String>,
    /// Distributed switch UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_uuid: Option<String>,
}

impl MachineClass {
    /// Untyped record handed to the seed client
    pub fn to_value(&self) -> Result<Value, ControllerError> {
        serde_json::to_value(self).map_err(|e| {
            ControllerError::InvalidValue(format!("could not encode machine class {}: {e}", self.name))
        })
    }

    /// Value of an optional placement field
    pub fn placement(&self, field: PlacementField) -> Option<&str> {
        let value = match field {
            PlacementField::Folder => &self.folder,
            PlacementField::GuestId => &self.guest_id,
            PlacementField::HostSystem => &self.host_system,
            PlacementField::ResourcePool => &self.resource_pool,
            PlacementField::ComputeCluster => &self.compute_cluster,
            PlacementField::Datastore => &self.datastore,
            PlacementField::DatastoreCluster => &self.datastore_cluster,
            PlacementField::SwitchUuid => &self.switch_uuid,
        };
        value.as_deref()
    }
}

/// Builds a [`MachineClass`] from pool, zone, image and machine type facts
#[derive(Debug, Default)]
pub struct MachineClassBuilder {
    name: String,
    region: String,
    ssh_key: String,
    cluster_namespace: String,
    datacenter: String,
    network: String,
    template_vm: String,
    machine: Option<MachineTypeFacts>,
    user_data: String,
    credentials: Option<MachineClassSecretData>,
    placement: BTreeMap<PlacementField, String>,
}

impl MachineClassBuilder {
    /// Start a class named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// vSphere region
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Public SSH key of the cluster
    #[must_use]
    pub fn ssh_key(mut self, key: impl Into<String>) -> Self {
        self.ssh_key = key.into();
        self
    }

    /// Namespace of the cluster, written into the ownership tags
    #[must_use]
    pub fn cluster_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cluster_namespace = namespace.into();
        self
    }

    /// Network segment the machines attach to
    #[must_use]
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Datacenter and placement constraints of the zone
    #[must_use]
    pub fn zone(mut self, zone: &ZoneConfig) -> Self {
        self.datacenter.clone_from(&zone.datacenter);
        let fields = [
            (PlacementField::HostSystem, &zone.host_system),
            (PlacementField::ResourcePool, &zone.resource_pool),
            (PlacementField::ComputeCluster, &zone.compute_cluster),
            (PlacementField::Datastore, &zone.datastore),
            (PlacementField::DatastoreCluster, &zone.datastore_cluster),
            (PlacementField::SwitchUuid, &zone.switch_uuid),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                self = self.placement(field, value);
            }
        }
        self
    }

    /// Template VM and guest id of the machine image
    #[must_use]
    pub fn image(mut self, image: &MachineImage) -> Self {
        self.template_vm.clone_from(&image.path);
        if let Some(guest_id) = &image.guest_id {
            self = self.placement(PlacementField::GuestId, guest_id);
        }
        self
    }

    /// CPU, memory and disk of the machine type
    #[must_use]
    pub fn machine(mut self, facts: MachineTypeFacts) -> Self {
        self.machine = Some(facts);
        self
    }

    /// Set a placement constraint; empty values are skipped
    #[must_use]
    pub fn placement(mut self, field: PlacementField, value: &str) -> Self {
        if value.is_empty() {
            self.placement.remove(&field);
        } else {
            self.placement.insert(field, value.to_string());
        }
        self
    }

    /// Bootstrap user data
    #[must_use]
    pub fn user_data(mut self, user_data: impl Into<String>) -> Self {
        self.user_data = user_data.into();
        self
    }

    /// Credentials merged into the secret after the user data
    #[must_use]
    pub fn credentials(mut self, credentials: &MachineClassSecretData) -> Self {
        self.credentials = Some(credentials.clone());
        self
    }

    /// Assemble the class, checking every mandatory field
    pub fn build(mut self) -> Result<MachineClass, ControllerError> {
        if self.name.is_empty() {
            return Err(ControllerError::InvalidValue("machine class name is empty".to_string()));
        }
        if self.network.is_empty() {
            return Err(ControllerError::MissingConfiguration(format!(
                "machine class {}: network segment not set",
                self.name
            )));
        }
        if self.ssh_key.is_empty() {
            return Err(ControllerError::MissingConfiguration(format!(
                "machine class {}: missing sshPublicKey",
                self.name
            )));
        }
        let machine = self.machine.ok_or_else(|| {
            ControllerError::MissingConfiguration(format!("machine class {}: machine type not set", self.name))
        })?;
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ControllerError::MissingConfiguration(format!("machine class {}: credentials not set", self.name))
        })?;

        let mut secret = BTreeMap::from([(USER_DATA_KEY.to_string(), std::mem::take(&mut self.user_data))]);
        for (key, value) in credentials.entries() {
            secret.insert(key.as_str().to_string(), value);
        }

        let tags = BTreeMap::from([
            (CLUSTER_TAG.to_string(), self.cluster_namespace.clone()),
            (ROLE_TAG.to_string(), ROLE_NODE.to_string()),
        ]);

        let mut placement = std::mem::take(&mut self.placement);
        Ok(MachineClass {
            region: self.region,
            ssh_keys: vec![self.ssh_key],
            datacenter: self.datacenter,
            network: self.network,
            template_vm: self.template_vm,
            num_cpus: machine.num_cpus,
            memory: machine.memory_mb,
            system_disk: SystemDisk {
                size: machine.system_disk_gb,
            },
            tags,
            secret,
            folder: placement.remove(&PlacementField::Folder),
            guest_id: placement.remove(&PlacementField::GuestId),
            host_system: placement.remove(&PlacementField::HostSystem),
            resource_pool: placement.remove(&PlacementField::ResourcePool),
            compute_cluster: placement.remove(&PlacementField::ComputeCluster),
            datastore: placement.remove(&PlacementField::Datastore),
            datastore_cluster: placement.remove(&PlacementField::DatastoreCluster),
            switch_uuid: placement.remove(&PlacementField::SwitchUuid),
            name: self.name,
        })
    }
}
