//! MetalLB adapter
//!
//! Bare-metal load-balancer handing out addresses from the configured pool
//! to `LoadBalancer` services. Its readiness gates the ingress controller,
//! which requests an address from this pool.

use crate::config::{AddressPool, CompositionInput};

use super::{Subsystem, SubsystemKind, SubsystemParameters};

/// Logical name of the load-balancer
pub const METALLB_NAME: &str = "metallb";

/// Load-balancer bound to an address pool
#[derive(Debug, Clone)]
pub struct Metallb {
    addresses: AddressPool,
}

impl Metallb {
    /// Load-balancer advertising the given pool
    pub fn new(addresses: AddressPool) -> Self {
        Self { addresses }
    }

    /// Narrow the composition input to the address pool
    pub fn from_input(input: &CompositionInput) -> Self {
        Self::new(input.load_balancer_addresses.clone())
    }
}

impl Subsystem for Metallb {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::LoadBalancer
    }

    fn logical_name(&self) -> &str {
        METALLB_NAME
    }

    fn parameters(&self) -> SubsystemParameters {
        SubsystemParameters::LoadBalancer {
            addresses: self.addresses.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_pool_verbatim() {
        let input =
            CompositionInput::new("10.0.0.10-10.0.0.20", "10.0.0.10", "tok-abc").unwrap();
        match Metallb::from_input(&input).parameters() {
            SubsystemParameters::LoadBalancer { addresses } => {
                assert_eq!(addresses.as_str(), "10.0.0.10-10.0.0.20")
            }
            other => panic!("unexpected parameters: {other:?}"),
        }
    }
}
