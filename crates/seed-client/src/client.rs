//! Kubernetes backed seed client
//!
//! Reads the cloud provider secret, decodes the infrastructure status and
//! server-side applies machine classes. Each machine class is written as a
//! `machine.sapcloud.io/v1alpha1` `MachineClass` plus a `Secret` of the same
//! name holding the user data and the vSphere credentials.

use std::collections::BTreeMap;

use crds::{InfrastructureStatus, SecretReference};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, Patch, PatchParams};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::SeedError;
use crate::models::{Credentials, PASSWORD_KEY, USERNAME_KEY};
use crate::seed_trait::SeedClientTrait;

/// API group of machine classes
pub const MACHINE_CLASS_GROUP: &str = "machine.sapcloud.io";
/// API version of machine classes
pub const MACHINE_CLASS_VERSION: &str = "v1alpha1";
/// Kind of machine classes
pub const MACHINE_CLASS_KIND: &str = "MachineClass";
/// Provider name written into every machine class
pub const MACHINE_CLASS_PROVIDER: &str = "vsphere";

const DEFAULT_FIELD_MANAGER: &str = "vsphere-worker-controller";
const PURPOSE_LABEL: &str = "gardener.cloud/purpose";
const PURPOSE_MACHINE_CLASS: &str = "machineclass";

/// Seed client talking to the Kubernetes API
#[derive(Clone)]
pub struct KubeSeedClient {
    client: Client,
    field_manager: String,
}

impl KubeSeedClient {
    /// Create a new seed client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }

    /// Use a different field manager for server-side apply
    #[must_use]
    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    fn machine_class_resource() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk(
            MACHINE_CLASS_GROUP,
            MACHINE_CLASS_VERSION,
            MACHINE_CLASS_KIND,
        ))
    }
}

impl std::fmt::Debug for KubeSeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSeedClient")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

/// Decode a raw infrastructure provider status
///
/// Fails with `NotFound` when the worker carries no status and with
/// `InvalidData` when the status does not decode.
pub fn decode_infrastructure_status(
    namespace: &str,
    raw: Option<&Value>,
) -> Result<InfrastructureStatus, SeedError> {
    let raw = raw.ok_or_else(|| {
        SeedError::NotFound(format!(
            "infrastructure provider status of worker in namespace {namespace}"
        ))
    })?;
    serde_json::from_value(raw.clone()).map_err(|e| {
        SeedError::InvalidData(format!(
            "could not decode infrastructure status of worker in namespace {namespace}: {e}"
        ))
    })
}

/// Read one UTF-8 value from a secret's data
pub(crate) fn secret_value(secret: &Secret, key: &str, secret_name: &str) -> Result<String, SeedError> {
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| SeedError::InvalidData(format!("secret {secret_name} has no key {key}")))?;
    String::from_utf8(bytes.0.clone()).map_err(|e| {
        SeedError::InvalidData(format!("secret {secret_name} key {key} is not valid UTF-8: {e}"))
    })
}

/// A machine class record split into name, secret data and provider spec
#[derive(Debug)]
pub(crate) struct MachineClassParts {
    pub(crate) name: String,
    pub(crate) secret_data: BTreeMap<String, String>,
    pub(crate) provider_spec: Map<String, Value>,
}

/// Split a flat machine class record for rendering
pub(crate) fn split_machine_class(class: &Value) -> Result<MachineClassParts, SeedError> {
    let mut provider_spec = class
        .as_object()
        .cloned()
        .ok_or_else(|| SeedError::InvalidData("machine class is not an object".to_string()))?;

    let name = match provider_spec.remove("name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => return Err(SeedError::InvalidData("machine class has no name".to_string())),
    };

    let secret = match provider_spec.remove("secret") {
        Some(Value::Object(secret)) => secret,
        _ => {
            return Err(SeedError::InvalidData(format!(
                "machine class {name} has no secret map"
            )));
        }
    };

    let mut secret_data = BTreeMap::new();
    for (key, value) in secret {
        match value {
            Value::String(value) => {
                secret_data.insert(key, value);
            }
            other => {
                return Err(SeedError::InvalidData(format!(
                    "machine class {name} secret key {key} is not a string: {other}"
                )));
            }
        }
    }

    Ok(MachineClassParts {
        name,
        secret_data,
        provider_spec,
    })
}

#[async_trait::async_trait]
impl SeedClientTrait for KubeSeedClient {
    async fn get_credentials(
        &self,
        secret_ref: &SecretReference,
        default_namespace: &str,
    ) -> Result<Credentials, SeedError> {
        let namespace = secret_ref.namespace_or(default_namespace);
        debug!("Reading credentials from secret {}/{}", namespace, secret_ref.name);

        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(&secret_ref.name).await?.ok_or_else(|| {
            SeedError::NotFound(format!("secret {}/{}", namespace, secret_ref.name))
        })?;

        Ok(Credentials {
            username: secret_value(&secret, USERNAME_KEY, &secret_ref.name)?,
            password: secret_value(&secret, PASSWORD_KEY, &secret_ref.name)?,
        })
    }

    async fn get_infrastructure_status(
        &self,
        namespace: &str,
        raw: Option<&Value>,
    ) -> Result<InfrastructureStatus, SeedError> {
        decode_infrastructure_status(namespace, raw)
    }

    async fn apply_machine_classes(
        &self,
        namespace: &str,
        machine_classes: &[Value],
    ) -> Result<(), SeedError> {
        let pp = PatchParams::apply(&self.field_manager).force();
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let resource = Self::machine_class_resource();
        let classes: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);

        for class in machine_classes {
            let parts = split_machine_class(class)?;

            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(parts.name.clone()),
                    namespace: Some(namespace.to_string()),
                    labels: Some(BTreeMap::from([(
                        PURPOSE_LABEL.to_string(),
                        PURPOSE_MACHINE_CLASS.to_string(),
                    )])),
                    ..Default::default()
                },
                string_data: Some(parts.secret_data),
                type_: Some("Opaque".to_string()),
                ..Default::default()
            };
            secrets.patch(&parts.name, &pp, &Patch::Apply(&secret)).await?;

            let secret_ref = serde_json::json!({
                "name": parts.name,
                "namespace": namespace,
            });
            let mut machine_class = DynamicObject::new(&parts.name, &resource).within(namespace);
            machine_class.data = serde_json::json!({
                "providerSpec": Value::Object(parts.provider_spec),
                "secretRef": secret_ref.clone(),
                "credentialsSecretRef": secret_ref,
                "provider": MACHINE_CLASS_PROVIDER,
            });
            classes
                .patch(&parts.name, &pp, &Patch::Apply(&machine_class))
                .await?;

            debug!("Applied machine class {}/{}", namespace, parts.name);
        }

        info!("Applied {} machine classes in namespace {}", machine_classes.len(), namespace);
        Ok(())
    }
}
