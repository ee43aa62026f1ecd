//! Pool configuration hash
//!
//! Machine class names carry a short hash of the pool fields that require new
//! machines when they change. Changing anything outside [`PoolHashPolicy`]
//! keeps the class name, so existing machines are left alone.

use std::collections::{BTreeMap, BTreeSet};

use crds::WorkerPool;
use sha2::{Digest, Sha256};

use crate::error::ControllerError;

/// Number of hex characters kept from the digest
pub const POOL_HASH_LENGTH: usize = 5;

/// A pool field that may take part in the hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashedField {
    /// major.minor of the pool or cluster Kubernetes version
    KubernetesVersion,
    /// Machine type name
    MachineType,
    /// Machine image name and version
    MachineImage,
    /// Root volume size and type
    Volume,
    /// Zone list, in order
    Zones,
    /// Node labels
    Labels,
    /// Node taints
    Taints,
    /// Bootstrap user data
    UserData,
}

impl HashedField {
    /// Every field, in hashing order
    pub const ALL: [Self; 8] = [
        Self::KubernetesVersion,
        Self::MachineType,
        Self::MachineImage,
        Self::Volume,
        Self::Zones,
        Self::Labels,
        Self::Taints,
        Self::UserData,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::KubernetesVersion => "kubernetesVersion",
            Self::MachineType => "machineType",
            Self::MachineImage => "machineImage",
            Self::Volume => "volume",
            Self::Zones => "zones",
            Self::Labels => "labels",
            Self::Taints => "taints",
            Self::UserData => "userData",
        }
    }
}

/// Which pool fields and annotations take part in the hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHashPolicy {
    /// Hashed fields
    pub fields: BTreeSet<HashedField>,
    /// Annotation keys that affect the node; all other annotations are ignored
    pub annotation_keys: BTreeSet<String>,
}

impl Default for PoolHashPolicy {
    fn default() -> Self {
        Self {
            fields: HashedField::ALL.into_iter().collect(),
            annotation_keys: BTreeSet::new(),
        }
    }
}

impl PoolHashPolicy {
    /// Drop `field` from the hash
    #[must_use]
    pub fn without(mut self, field: HashedField) -> Self {
        self.fields.remove(&field);
        self
    }

    /// Hash the annotation `key`
    #[must_use]
    pub fn with_annotation_key(mut self, key: impl Into<String>) -> Self {
        self.annotation_keys.insert(key.into());
        self
    }
}

/// Computes the configuration hash of worker pools
#[derive(Debug, Clone, Copy)]
pub struct PoolConfigHasher<'a> {
    policy: &'a PoolHashPolicy,
    cluster_version: &'a str,
}

impl<'a> PoolConfigHasher<'a> {
    /// Hasher salted with the cluster Kubernetes version
    pub fn new(policy: &'a PoolHashPolicy, cluster_version: &'a str) -> Self {
        Self {
            policy,
            cluster_version,
        }
    }

    /// Short hash of the pool's rollout relevant fields
    pub fn hash(&self, pool: &WorkerPool) -> Result<String, ControllerError> {
        let mut digests = String::new();

        for field in &self.policy.fields {
            if let Some(value) = self.field_value(*field, pool)? {
                digests.push_str(&sha256_hex(field.label(), &value));
            }
        }

        if !self.policy.annotation_keys.is_empty() {
            let annotations: BTreeMap<&String, &String> = pool
                .annotations
                .iter()
                .filter(|(key, _)| self.policy.annotation_keys.contains(*key))
                .collect();
            digests.push_str(&sha256_hex("annotations", &canonical_json(&annotations)?));
        }

        let mut hash = sha256_hex("pool", digests.as_bytes());
        hash.truncate(POOL_HASH_LENGTH);
        Ok(hash)
    }

    fn field_value(&self, field: HashedField, pool: &WorkerPool) -> Result<Option<Vec<u8>>, ControllerError> {
        let value = match field {
            HashedField::KubernetesVersion => {
                let version = pool.kubernetes_version.as_deref().unwrap_or(self.cluster_version);
                major_minor(version)?.into_bytes()
            }
            HashedField::MachineType => pool.machine_type.clone().into_bytes(),
            HashedField::MachineImage => {
                format!("{}:{}", pool.machine_image.name, pool.machine_image.version).into_bytes()
            }
            HashedField::Volume => match &pool.volume {
                Some(volume) => {
                    format!("{}:{}", volume.size, volume.type_.as_deref().unwrap_or_default()).into_bytes()
                }
                None => return Ok(None),
            },
            HashedField::Zones => pool.zones.join(",").into_bytes(),
            HashedField::Labels => canonical_json(&pool.labels)?,
            HashedField::Taints => {
                let mut taints: Vec<(&str, &str, &str)> = pool
                    .taints
                    .iter()
                    .map(|t| (t.key.as_str(), t.effect.as_str(), t.value.as_deref().unwrap_or_default()))
                    .collect();
                taints.sort_unstable();
                canonical_json(&taints)?
            }
            HashedField::UserData => pool.user_data.0.clone(),
        };
        Ok(Some(value))
    }
}

/// `major.minor` of a Kubernetes version such as `1.30.2` or `v1.30`
fn major_minor(version: &str) -> Result<String, ControllerError> {
    let trimmed = version.trim().trim_start_matches('v');
    let mut parts = trimmed.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) if major.parse::<u32>().is_ok() && minor.parse::<u32>().is_ok() => {
            Ok(format!("{major}.{minor}"))
        }
        _ => Err(ControllerError::InvalidValue(format!(
            "invalid kubernetes version {version:?}"
        ))),
    }
}

fn canonical_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ControllerError> {
    serde_json::to_vec(value)
        .map_err(|e| ControllerError::InvalidValue(format!("could not encode pool field: {e}")))
}

fn sha256_hex(label: &str, value: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update([0u8]);
    hasher.update(value);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::worker_pool;
    use k8s_openapi::api::core::v1::Taint;

    fn taint(key: &str, value: &str, effect: &str) -> Taint {
        Taint {
            key: key.to_string(),
            value: Some(value.to_string()),
            effect: effect.to_string(),
            time_added: None,
        }
    }

    #[test]
    fn test_hash_is_short_and_stable() {
        let policy = PoolHashPolicy::default();
        let hasher = PoolConfigHasher::new(&policy, "1.30.2");
        let pool = worker_pool("worker1", &["z1", "z2"]);

        let first = hasher.hash(&pool).unwrap();
        assert_eq!(first.len(), POOL_HASH_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(first, hasher.hash(&pool.clone()).unwrap());
    }

    #[test]
    fn test_image_version_changes_hash() {
        let policy = PoolHashPolicy::default();
        let hasher = PoolConfigHasher::new(&policy, "1.30.2");
        let pool = worker_pool("worker1", &["z1"]);
        let mut upgraded = pool.clone();
        upgraded.machine_image.version = "3227.2.0".to_string();

        assert_ne!(hasher.hash(&pool).unwrap(), hasher.hash(&upgraded).unwrap());
    }

    #[test]
    fn test_scaling_and_display_annotations_do_not_change_hash() {
        let policy = PoolHashPolicy::default().with_annotation_key("node.example.com/pinned");
        let hasher = PoolConfigHasher::new(&policy, "1.30.2");
        let pool = worker_pool("worker1", &["z1"]);

        let mut changed = pool.clone();
        changed.minimum = 10;
        changed.maximum = 20;
        changed
            .annotations
            .insert("example.com/owner".to_string(), "team-a".to_string());
        assert_eq!(hasher.hash(&pool).unwrap(), hasher.hash(&changed).unwrap());

        changed
            .annotations
            .insert("node.example.com/pinned".to_string(), "true".to_string());
        assert_ne!(hasher.hash(&pool).unwrap(), hasher.hash(&changed).unwrap());
    }

    #[test]
    fn test_patch_upgrade_keeps_hash() {
        let policy = PoolHashPolicy::default();
        let pool = worker_pool("worker1", &["z1"]);

        let patch_a = PoolConfigHasher::new(&policy, "1.30.2").hash(&pool).unwrap();
        let patch_b = PoolConfigHasher::new(&policy, "v1.30.5").hash(&pool).unwrap();
        let minor = PoolConfigHasher::new(&policy, "1.31.0").hash(&pool).unwrap();
        assert_eq!(patch_a, patch_b);
        assert_ne!(patch_a, minor);

        let mut pinned = pool.clone();
        pinned.kubernetes_version = Some("1.31.1".to_string());
        assert_eq!(PoolConfigHasher::new(&policy, "1.30.2").hash(&pinned).unwrap(), minor);
    }

    #[test]
    fn test_taint_order_does_not_matter() {
        let policy = PoolHashPolicy::default();
        let hasher = PoolConfigHasher::new(&policy, "1.30.2");

        let mut pool = worker_pool("worker1", &["z1"]);
        pool.taints = vec![taint("a", "1", "NoSchedule"), taint("b", "2", "NoExecute")];
        let mut reordered = pool.clone();
        reordered.taints.reverse();

        assert_eq!(hasher.hash(&pool).unwrap(), hasher.hash(&reordered).unwrap());
    }

    #[test]
    fn test_excluded_user_data_does_not_change_hash() {
        let policy = PoolHashPolicy::default().without(HashedField::UserData);
        let hasher = PoolConfigHasher::new(&policy, "1.30.2");
        let pool = worker_pool("worker1", &["z1"]);
        let mut changed = pool.clone();
        changed.user_data.0 = b"#!/bin/bash\necho changed".to_vec();

        assert_eq!(hasher.hash(&pool).unwrap(), hasher.hash(&changed).unwrap());

        let full = PoolHashPolicy::default();
        let hasher = PoolConfigHasher::new(&full, "1.30.2");
        assert_ne!(hasher.hash(&pool).unwrap(), hasher.hash(&changed).unwrap());
    }

    #[test]
    fn test_invalid_kubernetes_version() {
        let policy = PoolHashPolicy::default();
        let pool = worker_pool("worker1", &["z1"]);
        let err = PoolConfigHasher::new(&policy, "latest").hash(&pool).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }
}
