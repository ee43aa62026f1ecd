//! vSphere Worker CRD Definitions
//!
//! Kubernetes resource types consumed by the worker controller: the `Worker`
//! custom resource, the cloud profile with its machine type catalog, and the
//! decoded infrastructure status.

pub mod cloud_profile;
pub mod error;
pub mod infrastructure;
pub mod machine_image;
pub mod references;
pub mod worker;

pub use cloud_profile::*;
pub use error::*;
pub use infrastructure::*;
pub use machine_image::*;
pub use references::*;
pub use worker::*;
