//! Mock SeedClient for unit testing
//!
//! Stores secrets in memory, decodes infrastructure status like the real
//! client and records every machine class apply. Call counters let tests
//! check how often the controller reached out to the seed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crds::{InfrastructureStatus, SecretReference};
use serde_json::Value;

use crate::client::{decode_infrastructure_status, split_machine_class};
use crate::error::SeedError;
use crate::models::Credentials;
use crate::seed_trait::SeedClientTrait;

/// A recorded `apply_machine_classes` call
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMachineClasses {
    /// Target namespace
    pub namespace: String,
    /// Applied machine class records
    pub machine_classes: Vec<Value>,
}

/// Mock SeedClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockSeedClient {
    pub(crate) secrets: Arc<Mutex<HashMap<String, Credentials>>>,
    pub(crate) applied: Arc<Mutex<Vec<AppliedMachineClasses>>>,
    pub(crate) credential_calls: Arc<Mutex<u32>>,
    pub(crate) infrastructure_calls: Arc<Mutex<u32>>,
    pub(crate) fail_apply: Arc<Mutex<Option<String>>>,
    pub(crate) fetch_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockSeedClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Store credentials under `namespace/name` (for test setup)
    pub fn add_secret(&self, namespace: &str, name: &str, credentials: Credentials) {
        self.secrets
            .lock()
            .unwrap()
            .insert(format!("{namespace}/{name}"), credentials);
    }

    /// Make every following apply fail with `message`
    pub fn fail_apply_with(&self, message: impl Into<String>) {
        *self.fail_apply.lock().unwrap() = Some(message.into());
    }

    /// Delay every credential and infrastructure lookup
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    /// Number of credential lookups so far
    pub fn credential_calls(&self) -> u32 {
        *self.credential_calls.lock().unwrap()
    }

    /// Number of infrastructure status lookups so far
    pub fn infrastructure_calls(&self) -> u32 {
        *self.infrastructure_calls.lock().unwrap()
    }

    /// All recorded apply calls
    pub fn applied(&self) -> Vec<AppliedMachineClasses> {
        self.applied.lock().unwrap().clone()
    }

    async fn wait(&self) {
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl SeedClientTrait for MockSeedClient {
    async fn get_credentials(
        &self,
        secret_ref: &SecretReference,
        default_namespace: &str,
    ) -> Result<Credentials, SeedError> {
        *self.credential_calls.lock().unwrap() += 1;
        self.wait().await;

        let key = format!(
            "{}/{}",
            secret_ref.namespace_or(default_namespace),
            secret_ref.name
        );
        self.secrets
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| SeedError::NotFound(format!("secret {key}")))
    }

    async fn get_infrastructure_status(
        &self,
        namespace: &str,
        raw: Option<&Value>,
    ) -> Result<InfrastructureStatus, SeedError> {
        *self.infrastructure_calls.lock().unwrap() += 1;
        self.wait().await;
        decode_infrastructure_status(namespace, raw)
    }

    async fn apply_machine_classes(
        &self,
        namespace: &str,
        machine_classes: &[Value],
    ) -> Result<(), SeedError> {
        if let Some(message) = self.fail_apply.lock().unwrap().clone() {
            return Err(SeedError::InvalidData(message));
        }
        for class in machine_classes {
            split_machine_class(class)?;
        }
        self.applied.lock().unwrap().push(AppliedMachineClasses {
            namespace: namespace.to_string(),
            machine_classes: machine_classes.to_vec(),
        });
        Ok(())
    }
}
