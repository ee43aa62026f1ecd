//! Test utilities for the generator and reconciler tests
//!
//! Fixtures for workers, pools, the cluster profile and a seeded mock client.

use std::collections::BTreeMap;

use crds::{
    ClusterProfile, MachineImageRef, MachineType, MachineTypeStorage, SecretReference, Worker, WorkerPool,
    WorkerSpec,
};
use k8s_openapi::ByteString;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use seed_client::{Credentials, MockSeedClient};

use crate::generator::machine_class::MachineClassSecretData;

/// Namespace of the test cluster
pub const NAMESPACE: &str = "shoot--foo--bar";

/// Name of the cloud provider secret
pub const SECRET_NAME: &str = "cloudprovider";

/// Public SSH key of the test cluster
pub const SSH_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2E test@example.com";

const PROFILE: &str = r#"
kubernetesVersion: "1.30.2"
cloudProfile:
  machineTypes:
    - name: std-02
      cpu: "2"
      memory: 4Gi
    - name: std-04
      cpu: "4"
      memory: 8Gi
      storage:
        storageSize: 50Gi
        type: default
    - name: tiny-disk
      cpu: "1"
      memory: 2Gi
      storage:
        storageSize: 5Gi
        type: default
providerConfig:
  regions:
    - name: eu-1
      vsphereHost: vcenter.eu-1.example.com
      vsphereInsecureSSL: true
  machineImages:
    - name: flatcar
      versions:
        - version: "3139.2.3"
          path: gardener/templates/flatcar-3139.2.3
          guestId: coreos64Guest
        - version: "3227.2.0"
          path: gardener/templates/flatcar-3227.2.0
    - name: ubuntu
      versions:
        - version: "22.04"
          path: gardener/templates/ubuntu-22.04
"#;

/// Cluster profile with two usable machine types and two images
pub fn cluster_profile() -> ClusterProfile {
    ClusterProfile::from_yaml(PROFILE).unwrap()
}

/// Machine type with an optional storage size
pub fn machine_type(name: &str, cpu: &str, memory: &str, storage: Option<&str>) -> MachineType {
    MachineType {
        name: name.to_string(),
        cpu: Quantity(cpu.to_string()),
        memory: Quantity(memory.to_string()),
        usable: Some(true),
        storage: storage.map(|size| MachineTypeStorage {
            class: None,
            storage_size: Quantity(size.to_string()),
            type_: "default".to_string(),
        }),
    }
}

/// Credentials of the eu-1 region
pub fn secret_data() -> MachineClassSecretData {
    MachineClassSecretData {
        host: "vcenter.eu-1.example.com".to_string(),
        username: "admin".to_string(),
        password: "secret".to_string(),
        insecure_ssl: true,
    }
}

/// Pool `name` over `zones`: min 3, max 6, surge 50%, unavailable 1
pub fn worker_pool(name: &str, zones: &[&str]) -> WorkerPool {
    WorkerPool {
        name: name.to_string(),
        machine_type: "std-02".to_string(),
        machine_image: MachineImageRef {
            name: "flatcar".to_string(),
            version: "3139.2.3".to_string(),
        },
        zones: zones.iter().map(|zone| (*zone).to_string()).collect(),
        minimum: 3,
        maximum: 6,
        max_surge: IntOrString::String("50%".to_string()),
        max_unavailable: IntOrString::Int(1),
        labels: BTreeMap::from([("worker.gardener.cloud/pool".to_string(), name.to_string())]),
        annotations: BTreeMap::new(),
        taints: Vec::new(),
        user_data: ByteString(b"#!/bin/bash\necho hello".to_vec()),
        volume: None,
        kubernetes_version: None,
    }
}

/// Raw infrastructure status with a segment and a config for every zone
pub fn infrastructure_status(zones: &[&str]) -> serde_json::Value {
    let zone_configs: serde_json::Map<String, serde_json::Value> = zones
        .iter()
        .enumerate()
        .map(|(idx, zone)| {
            (
                (*zone).to_string(),
                serde_json::json!({
                    "datacenter": "dc1",
                    "computeCluster": format!("cluster-{}", idx + 1),
                    "datastore": "ds-1",
                }),
            )
        })
        .collect();

    serde_json::json!({
        "apiVersion": "vsphere.provider.extensions.gardener.cloud/v1alpha1",
        "kind": "InfrastructureStatus",
        "vsphereConfig": {
            "folder": "gardener",
            "region": "eu-1",
            "zoneConfigs": zone_configs,
        },
        "nsxtInfraState": {"segmentName": format!("{NAMESPACE}-segment")},
    })
}

/// Worker in [`NAMESPACE`] with infrastructure status for `infra_zones`
pub fn worker(pools: Vec<WorkerPool>, infra_zones: &[&str]) -> Worker {
    let mut worker = Worker::new(
        "worker",
        WorkerSpec {
            region: "eu-1".to_string(),
            secret_ref: SecretReference::new(SECRET_NAME),
            infrastructure_provider_status: Some(infrastructure_status(infra_zones)),
            ssh_public_key: ByteString(SSH_KEY.as_bytes().to_vec()),
            pools,
        },
    );
    worker.metadata.namespace = Some(NAMESPACE.to_string());
    worker
}

/// Mock seed client holding the cloud provider secret
pub fn mock_seed_client() -> MockSeedClient {
    let client = MockSeedClient::new();
    client.add_secret(NAMESPACE, SECRET_NAME, Credentials::new("admin", "secret"));
    client
}
