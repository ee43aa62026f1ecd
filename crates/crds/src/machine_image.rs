//! Resolved machine image record
//!
//! Reported in the worker status so that image usage can be tracked and
//! unused images cleaned up.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A machine image referenced by at least one worker pool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    /// Image name
    pub name: String,

    /// Image version
    pub version: String,

    /// Template VM path of the image
    pub path: String,

    /// Guest OS identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
}

impl MachineImage {
    /// Whether this record describes the same (name, version) pair
    pub fn matches(&self, name: &str, version: &str) -> bool {
        self.name == name && self.version == version
    }
}
