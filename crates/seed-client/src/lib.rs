//! Seed Cluster Client
//!
//! Access to the seed cluster for the vSphere worker controller:
//!
//! - **Credentials**: reads the vSphere user and password from the cloud provider secret
//! - **Infrastructure status**: decodes the raw infrastructure provider status of a worker
//! - **Machine classes**: server-side applies `MachineClass` objects and their secrets
//!
//! # Example
//!
//! ```no_run
//! use seed_client::{KubeSeedClient, SeedClientTrait};
//! use crds::SecretReference;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeSeedClient::new(kube::Client::try_default().await?);
//! let creds = client
//!     .get_credentials(&SecretReference::new("cloudprovider"), "shoot--foo--bar")
//!     .await?;
//! println!("vSphere user: {}", creds.username);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod seed_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{KubeSeedClient, decode_infrastructure_status};
pub use error::SeedError;
pub use models::*;
pub use seed_trait::SeedClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockSeedClient;
