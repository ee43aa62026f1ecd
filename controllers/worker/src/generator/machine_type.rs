//! Machine type catalog lookup
//!
//! Resolves a machine type name to the CPU count, memory and system disk
//! size written into every machine class of a pool.

use crds::MachineType;
use tracing::error;

use super::quantity::quantity_as_i64;
use crate::error::ControllerError;

/// System disk size used when a machine type declares no storage
pub const DEFAULT_SYSTEM_DISK_GB: i64 = 20;

/// Smallest accepted system disk
pub const MIN_SYSTEM_DISK_GB: i64 = 10;

const MIB: i64 = 1024 * 1024;
const GIB: i64 = 1024 * 1024 * 1024;

/// Normalized machine type values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineTypeFacts {
    /// Number of CPUs
    pub num_cpus: i64,
    /// Memory in MB
    pub memory_mb: i64,
    /// System disk size in GB
    pub system_disk_gb: i64,
}

/// Ordered machine type catalog of a cloud profile
#[derive(Debug, Clone, Copy)]
pub struct MachineTypeCatalog<'a> {
    machine_types: &'a [MachineType],
}

impl<'a> MachineTypeCatalog<'a> {
    /// Wrap a machine type list
    pub fn new(machine_types: &'a [MachineType]) -> Self {
        Self { machine_types }
    }

    /// Resolve the first machine type named `name`
    pub fn lookup(&self, name: &str) -> Result<MachineTypeFacts, ControllerError> {
        let Some(machine_type) = self.machine_types.iter().find(|t| t.name == name) else {
            error!("Machine type {} not found in cloud profile", name);
            return Err(ControllerError::NotFound(format!("machine type {name}")));
        };
        machine_type_facts(machine_type)
    }
}

fn machine_type_facts(machine_type: &MachineType) -> Result<MachineTypeFacts, ControllerError> {
    let name = &machine_type.name;

    let num_cpus = quantity_as_i64(&machine_type.cpu)
        .filter(|cpus| *cpus > 0)
        .ok_or_else(|| {
            ControllerError::InvalidValue(format!(
                "machine type {name} has invalid cpu {}",
                machine_type.cpu.0
            ))
        })?;

    let memory_mb = quantity_as_i64(&machine_type.memory)
        .map(|bytes| bytes / MIB)
        .filter(|mb| *mb > 0)
        .ok_or_else(|| {
            ControllerError::InvalidValue(format!(
                "machine type {name} has invalid memory {}",
                machine_type.memory.0
            ))
        })?;

    let system_disk_gb = match &machine_type.storage {
        None => DEFAULT_SYSTEM_DISK_GB,
        Some(storage) => quantity_as_i64(&storage.storage_size)
            .map(|bytes| bytes / GIB)
            .filter(|gb| *gb >= MIN_SYSTEM_DISK_GB)
            .ok_or_else(|| {
                ControllerError::InvalidValue(format!(
                    "machine type {name} has invalid storage size {} (minimum {MIN_SYSTEM_DISK_GB}Gi)",
                    storage.storage_size.0
                ))
            })?,
    };

    Ok(MachineTypeFacts {
        num_cpus,
        memory_mb,
        system_disk_gb,
    })
}
