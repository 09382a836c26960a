//! ingress-nginx adapter
//!
//! The controller's service requests a fixed address from the MetalLB pool,
//! so it must not be created before MetalLB is ready.

use std::net::IpAddr;

use crate::config::CompositionInput;

use super::{Subsystem, SubsystemKind, SubsystemParameters};

/// Logical name of the ingress controller
pub const INGRESS_NGINX_NAME: &str = "ingress-nginx";

const GATES: &[SubsystemKind] = &[SubsystemKind::LoadBalancer];

/// Ingress controller bound to a public address
#[derive(Debug, Clone)]
pub struct IngressNginx {
    ip: IpAddr,
}

impl IngressNginx {
    /// Ingress controller requesting `ip` for its service
    pub fn new(ip: IpAddr) -> Self {
        Self { ip }
    }

    /// Narrow the composition input to the ingress address
    pub fn from_input(input: &CompositionInput) -> Self {
        Self::new(input.ingress_ip)
    }
}

impl Subsystem for IngressNginx {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::IngressController
    }

    fn logical_name(&self) -> &str {
        INGRESS_NGINX_NAME
    }

    fn gates(&self) -> &[SubsystemKind] {
        GATES
    }

    fn parameters(&self) -> SubsystemParameters {
        SubsystemParameters::IngressController { ip: self.ip }
    }
}
