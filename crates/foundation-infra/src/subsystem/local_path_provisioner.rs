//! local-path-provisioner adapter
//!
//! Provisions PersistentVolumes as host directories. Volumes are retained
//! when their claim is deleted so data outlives the workloads using it.

use foundation_common::LOCAL_PATH_STORAGE_DIR;

use super::{ReclaimPolicy, Subsystem, SubsystemKind, SubsystemParameters};

/// Logical name of the storage provisioner
pub const LOCAL_PATH_PROVISIONER_NAME: &str = "local-path-provisioner";

/// Storage provisioner with the composition's fixed storage policy
#[derive(Debug, Clone)]
pub struct LocalPathProvisioner {
    path: String,
    reclaim_policy: ReclaimPolicy,
}

impl Default for LocalPathProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPathProvisioner {
    /// Provisioner writing under the fixed host path with `Retain`
    pub fn new() -> Self {
        Self {
            path: LOCAL_PATH_STORAGE_DIR.to_string(),
            reclaim_policy: ReclaimPolicy::Retain,
        }
    }
}

impl Subsystem for LocalPathProvisioner {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::StorageProvisioner
    }

    fn logical_name(&self) -> &str {
        LOCAL_PATH_PROVISIONER_NAME
    }

    fn parameters(&self) -> SubsystemParameters {
        SubsystemParameters::StorageProvisioner {
            path: self.path.clone(),
            reclaim_policy: self.reclaim_policy,
        }
    }
}
