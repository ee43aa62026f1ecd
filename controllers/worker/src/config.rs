//! Controller configuration
//!
//! Read once at startup from environment variables:
//! - `WATCH_NAMESPACE`: namespace to watch (all namespaces when unset)
//! - `CLOUD_PROFILE_PATH`: YAML file with the cluster Kubernetes version, the
//!   machine type catalog, the regions and the machine images (required)
//! - `HASH_ANNOTATION_KEYS`: comma separated pool annotation keys that take
//!   part in the pool hash
//! - `HASH_EXCLUDE_USER_DATA`: leave user data out of the pool hash

use std::env;
use std::fs;

use crds::ClusterProfile;

use crate::error::ControllerError;
use crate::generator::pool_hash::{HashedField, PoolHashPolicy};

const WATCH_NAMESPACE: &str = "WATCH_NAMESPACE";
const CLOUD_PROFILE_PATH: &str = "CLOUD_PROFILE_PATH";
const HASH_ANNOTATION_KEYS: &str = "HASH_ANNOTATION_KEYS";
const HASH_EXCLUDE_USER_DATA: &str = "HASH_EXCLUDE_USER_DATA";

/// Configuration of the worker controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace to watch, `None` for all namespaces
    pub namespace: Option<String>,
    /// Path the cluster profile was loaded from
    pub profile_path: String,
    /// Cluster profile
    pub profile: ClusterProfile,
    /// Fields taking part in the pool hash
    pub hash_policy: PoolHashPolicy,
}

impl ControllerConfig {
    /// Load the configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let namespace = lookup(WATCH_NAMESPACE).filter(|ns| !ns.is_empty());

        let profile_path = lookup(CLOUD_PROFILE_PATH).filter(|p| !p.is_empty()).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("{CLOUD_PROFILE_PATH} environment variable is required"))
        })?;
        let yaml = fs::read_to_string(&profile_path)
            .map_err(|e| ControllerError::InvalidConfig(format!("cannot read {profile_path}: {e}")))?;
        let profile = ClusterProfile::from_yaml(&yaml)
            .map_err(|e| ControllerError::InvalidConfig(format!("invalid cluster profile {profile_path}: {e}")))?;

        let hash_policy = hash_policy(
            lookup(HASH_ANNOTATION_KEYS).as_deref(),
            lookup(HASH_EXCLUDE_USER_DATA).as_deref(),
        )?;

        Ok(Self {
            namespace,
            profile_path,
            profile,
            hash_policy,
        })
    }
}

fn hash_policy(
    annotation_keys: Option<&str>,
    exclude_user_data: Option<&str>,
) -> Result<PoolHashPolicy, ControllerError> {
    let mut policy = PoolHashPolicy::default();

    for key in annotation_keys.unwrap_or_default().split(',') {
        let key = key.trim();
        if !key.is_empty() {
            policy = policy.with_annotation_key(key);
        }
    }

    let exclude = match exclude_user_data.map(str::trim) {
        None | Some("") => false,
        Some(value) => parse_bool(HASH_EXCLUDE_USER_DATA, value)?,
    };
    if exclude {
        policy = policy.without(HashedField::UserData);
    }

    Ok(policy)
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ControllerError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ControllerError::InvalidConfig(format!(
            "{name} must be a boolean, got {value:?}"
        ))),
    }
}
