//! Subsystem adapters
//!
//! Each infrastructure capability is a thin [`Subsystem`] implementation that
//! knows its logical name, its fixed policy defaults, and which other
//! subsystems gate it. The orchestrator only talks to the trait, so a new
//! subsystem is added by implementing it and registering the adapter.
//!
//! - [`local_path_provisioner`]: dynamic hostPath storage provisioning
//! - [`metallb`]: bare-metal load-balancer
//! - [`ingress_nginx`]: ingress controller, gated on MetalLB readiness
//! - [`cert_manager`]: certificate manager with an ACME DNS-01 solver

pub mod cert_manager;
pub mod ingress_nginx;
pub mod local_path_provisioner;
pub mod metallb;

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::Serialize;

use foundation_common::{Error, Result, Secret};

use crate::config::AddressPool;
use crate::namespace::NamespaceHandle;
use crate::resource::{ChildOptions, ResourceRef};

pub use cert_manager::CertManager;
pub use ingress_nginx::IngressNginx;
pub use local_path_provisioner::LocalPathProvisioner;
pub use metallb::Metallb;

/// The capability a subsystem provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SubsystemKind {
    /// Dynamic persistent volume provisioning
    StorageProvisioner,
    /// Bare-metal LoadBalancer service addresses
    LoadBalancer,
    /// HTTP(S) ingress
    IngressController,
    /// TLS certificate issuance
    CertificateManager,
}

impl SubsystemKind {
    /// Name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StorageProvisioner => "StorageProvisioner",
            Self::LoadBalancer => "LoadBalancer",
            Self::IngressController => "IngressController",
            Self::CertificateManager => "CertificateManager",
        }
    }
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What "ready" means for a readiness signal
///
/// The engine resolves the signal; the composition only records which
/// definition downstream subsystems wait for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessMode {
    /// Every object of the subsystem has been accepted by the API server
    ResourcesCreated,
    /// Workloads of the subsystem report available/healthy
    #[default]
    WorkloadsReady,
}

impl FromStr for ReadinessMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resources-created" => Ok(Self::ResourcesCreated),
            "workloads-ready" => Ok(Self::WorkloadsReady),
            other => Err(Error::invalid_config(
                "readiness",
                format!(
                    "unknown readiness mode '{}' (expected resources-created or workloads-ready)",
                    other
                ),
            )),
        }
    }
}

/// Opaque marker the engine resolves to "subsystem is ready to serve"
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessSignal {
    /// Subsystem whose readiness is awaited
    pub subsystem: SubsystemKind,
    /// Resource name of that subsystem
    pub resource_name: String,
    /// Readiness definition
    pub mode: ReadinessMode,
}

/// PersistentVolume reclaim policy for provisioned volumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReclaimPolicy {
    /// Volumes survive deletion of their claim
    Retain,
    /// Volumes are removed with their claim
    Delete,
}

/// Subsystem-specific desired-state parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum SubsystemParameters {
    /// local-path-provisioner
    StorageProvisioner {
        /// Host directory volumes are created under
        path: String,
        /// Reclaim policy of the storage class
        reclaim_policy: ReclaimPolicy,
    },
    /// MetalLB
    LoadBalancer {
        /// Address pool to advertise
        addresses: AddressPool,
    },
    /// ingress-nginx
    IngressController {
        /// LoadBalancer address requested for the controller service
        ip: IpAddr,
    },
    /// cert-manager
    CertificateManager {
        /// DNS provider token for DNS-01 challenges
        cloudflare_api_token: Secret,
        /// ACME directory URL
        acme_server: String,
    },
}

impl SubsystemParameters {
    /// The subsystem kind these parameters configure
    pub fn kind(&self) -> SubsystemKind {
        match self {
            Self::StorageProvisioner { .. } => SubsystemKind::StorageProvisioner,
            Self::LoadBalancer { .. } => SubsystemKind::LoadBalancer,
            Self::IngressController { .. } => SubsystemKind::IngressController,
            Self::CertificateManager { .. } => SubsystemKind::CertificateManager,
        }
    }
}

/// Desired state of one subsystem, handed to the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsystemDescriptor {
    /// Capability provided
    pub kind: SubsystemKind,
    /// Resource name within the composition
    pub resource_name: String,
    /// Namespace the subsystem is installed into
    pub namespace: NamespaceHandle,
    /// Subsystem-specific parameters
    pub parameters: SubsystemParameters,
    /// Readiness of other subsystems that must precede this one
    pub depends_on: BTreeSet<ReadinessSignal>,
    /// Deletion-protection
    pub protect: bool,
    /// Resources outside the composition that must exist first
    pub external_dependencies: BTreeSet<ResourceRef>,
}

impl SubsystemDescriptor {
    /// Whether this subsystem waits for the readiness of `kind`
    pub fn waits_for(&self, kind: SubsystemKind) -> bool {
        self.depends_on.iter().any(|s| s.subsystem == kind)
    }
}

/// Capability implemented by every subsystem adapter
pub trait Subsystem: fmt::Debug {
    /// Capability provided
    fn kind(&self) -> SubsystemKind;

    /// Logical name; also the resource name and namespace suffix
    fn logical_name(&self) -> &str;

    /// Subsystems whose readiness must precede this one
    fn gates(&self) -> &[SubsystemKind] {
        &[]
    }

    /// Subsystem-specific parameters, including fixed policy defaults
    fn parameters(&self) -> SubsystemParameters;

    /// Declare the desired state of this subsystem
    ///
    /// Refuses to declare unless every gate's readiness is in `depends_on`:
    /// creating a gated subsystem early is a correctness bug, not a
    /// performance concern.
    fn declare(
        &self,
        namespace: &NamespaceHandle,
        depends_on: BTreeSet<ReadinessSignal>,
        options: &ChildOptions,
    ) -> Result<SubsystemDescriptor> {
        if let Some(missing) = self
            .gates()
            .iter()
            .find(|gate| !depends_on.iter().any(|s| s.subsystem == **gate))
        {
            return Err(Error::UnknownDependency {
                subsystem: self.logical_name().to_string(),
                dependency: missing.to_string(),
            });
        }

        Ok(SubsystemDescriptor {
            kind: self.kind(),
            resource_name: self.logical_name().to_string(),
            namespace: namespace.clone(),
            parameters: self.parameters(),
            depends_on,
            protect: options.protect,
            external_dependencies: options.external_dependencies.clone(),
        })
    }

    /// Signal downstream subsystems wait on
    fn readiness_signal(&self, mode: ReadinessMode) -> ReadinessSignal {
        ReadinessSignal {
            subsystem: self.kind(),
            resource_name: self.logical_name().to_string(),
            mode,
        }
    }
}
